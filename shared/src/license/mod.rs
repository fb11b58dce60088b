// Copyright (C) 2024  radio-automation contributors. Licensed under GPL-3.0-or-later, see /COPYING file for details
//! License text shown at startup.

/// Welcome banner printed once at process start.
pub const WELCOME: &str = "\n\
radio-automation  Copyright (C) 2024  radio-automation contributors\n\
This program comes with ABSOLUTELY NO WARRANTY.\n\
This is free software, and you are welcome to redistribute it\n\
under certain conditions; see the COPYING file for details.\n";
