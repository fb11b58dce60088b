//! [`PlayerSession`]: supervises a single media-subprocess child.

use crate::{Error, Phase, PlayRequest, PlayerState};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::io::FromRawFd;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Configuration for how a [`PlayerSession`] spawns its subprocess.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Path to the media-player binary (spec §6 `mplayer`).
    pub player_path: String,
    /// Seconds of silence from the property poll before the subprocess is
    /// considered dead and killed (spec §6 `mplayertimeout`).
    pub timeout: Duration,
    /// Where subprocess stderr is redirected (spec §6 `mplayer_errorlog`).
    pub errorlog_path: PathBuf,
}
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            player_path: "mplayer".into(),
            timeout: Duration::from_secs(6),
            errorlog_path: PathBuf::from("/dev/null"),
        }
    }
}

struct RunningProcess {
    child: Child,
    commands: File,
    answers: mpsc::Receiver<String>,
    last_alive: Instant,
}

/// Drives one external media-player subprocess over its slave control pipe.
///
/// Two locks guard disjoint state, mirroring the source design: `process`
/// guards anything that talks to the child, `state` guards the
/// publicly-observable [`PlayerState`] snapshot. [`PlayerSession::play`]
/// releases `process` between each 250ms liveness poll so that `pause`,
/// `stop`, and the others can still reach the child while a track plays.
pub struct PlayerSession {
    config: SessionConfig,
    process: Mutex<Option<RunningProcess>>,
    state: Mutex<PlayerState>,
}
impl PlayerSession {
    /// Constructs a session with no subprocess running yet.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
            state: Mutex::new(PlayerState::default()),
        }
    }

    /// Returns a snapshot of the current player state.
    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.state_guard().clone()
    }

    fn state_guard(&self) -> std::sync::MutexGuard<'_, PlayerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn process_guard(&self) -> std::sync::MutexGuard<'_, Option<RunningProcess>> {
        self.process
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Spawns the subprocess for `request` and blocks until it dies, either
    /// from track completion, an explicit [`PlayerSession::stop`], or a
    /// liveness timeout. Mirrors spec §4.4: the calling thread is dedicated
    /// to this session for the full duration of playback.
    ///
    /// # Errors
    /// Returns [`Error::SpawnFailed`] or [`Error::PipeFailed`] if the
    /// subprocess or its pipes cannot be created.
    pub fn play(&self, request: &PlayRequest) -> Result<(), Error> {
        {
            let mut state = self.state_guard();
            state.phase = Phase::Spawning;
            state.now_playing = Some(request.filename.clone());
            state.paused = false;
            state.time_pos = 0.0;
            state.length = 0.0;
        }

        let running = self.spawn(request)?;
        *self.process_guard() = Some(running);
        self.state_guard().phase = Phase::Running;

        loop {
            {
                let mut guard = self.process_guard();
                let Some(running) = guard.as_mut() else {
                    break;
                };
                if let Ok(Some(_status)) = running.child.try_wait() {
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(250));

            self.poll_property("pause");
            self.poll_property("time_pos");
            self.poll_property("length");
            self.poll_property("metadata");

            let mut guard = self.process_guard();
            let Some(running) = guard.as_mut() else {
                break;
            };
            if let Ok(Some(_status)) = running.child.try_wait() {
                break;
            }
            if running.last_alive.elapsed() > self.config.timeout {
                tracing::warn!("subprocess timed out, killing");
                let _ = running.child.kill();
                break;
            }
        }

        self.kill_and_reap();
        let mut state = self.state_guard();
        *state = PlayerState::default();
        Ok(())
    }

    /// Toggles pause state, if a subprocess is running.
    pub fn pause(&self) {
        let running = self.process_guard();
        let Some(running) = running.as_ref() else {
            return;
        };
        let mut commands = &running.commands;
        let _ = writeln!(commands, "pause");
        let _ = commands.flush();
        let mut state = self.state_guard();
        state.paused = !state.paused;
    }

    /// Unpauses, if currently paused and a subprocess is running.
    pub fn unpause(&self) {
        let already_paused = self.state_guard().paused;
        if already_paused {
            self.pause();
        }
    }

    /// Kills the subprocess immediately, if one is running.
    pub fn stop(&self) {
        let running = self.process_guard();
        if let Some(running) = running.as_ref() {
            let pid = i32::try_from(running.child.id()).unwrap_or(i32::MAX);
            // SAFETY: killing our own supervised child's process group.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }

    /// Sets playback speed, if a subprocess is running.
    pub fn set_speed(&self, speed: f64) {
        self.send_property_set("speed", speed);
    }

    /// Seeks to an absolute time position in seconds, if a subprocess is running.
    pub fn seek(&self, time_pos: f64) {
        self.send_property_set("time_pos", time_pos);
    }

    fn send_property_set(&self, property: &str, value: f64) {
        let running = self.process_guard();
        let Some(running) = running.as_ref() else {
            return;
        };
        let mut commands = &running.commands;
        let _ = writeln!(commands, "pausing_keep_force set_property {property} {value}");
        let _ = commands.flush();
    }

    fn poll_property(&self, property: &str) {
        let expected_prefix = format!("ANS_{property}=");
        let mut process = self.process_guard();
        let Some(running) = process.as_mut() else {
            return;
        };
        let mut commands = &running.commands;
        if writeln!(commands, "pausing_keep_force get_property {property}").is_err() {
            return;
        }
        let _ = commands.flush();

        let Ok(line) = running.answers.recv_timeout(Duration::from_millis(250)) else {
            return;
        };
        let Some(value) = line.strip_prefix(&expected_prefix) else {
            return;
        };
        running.last_alive = Instant::now();
        drop(process);
        let mut state = self.state_guard();
        match property {
            "pause" => state.paused = value.contains("yes"),
            "time_pos" => state.time_pos = value.trim().parse().unwrap_or(state.time_pos),
            "length" => state.length = value.trim().parse().unwrap_or(state.length),
            "metadata" => state.metadata = value.to_string(),
            _ => {}
        }
    }

    fn kill_and_reap(&self) {
        let mut guard = self.process_guard();
        if let Some(mut running) = guard.take() {
            let _ = running.child.kill();
            let _ = running.child.wait();
        }
    }

    fn spawn(&self, request: &PlayRequest) -> Result<RunningProcess, Error> {
        let mut slave_fds = [0i32; 2];
        // SAFETY: `slave_fds` is a valid, correctly-sized out-param.
        if unsafe { libc::pipe(slave_fds.as_mut_ptr()) } != 0 {
            return Err(Error::PipeFailed(std::io::Error::last_os_error()));
        }
        let [slave_read_fd, slave_write_fd] = slave_fds;
        // The write end is ours alone; mark it close-on-exec so it isn't
        // inherited into the child's fd table (std already does this for
        // every fd it opens itself, so `slave_read_fd` is the only one we
        // need to manage by hand).
        // SAFETY: `slave_write_fd` was just created above and is open.
        unsafe {
            let flags = libc::fcntl(slave_write_fd, libc::F_GETFD);
            libc::fcntl(slave_write_fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }

        let errorlog = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.config.errorlog_path)
            .map_err(Error::SpawnFailed)?;

        let mut command = Command::new(&self.config.player_path);
        command
            .arg("-quiet")
            .arg("-msglevel")
            .arg("all=0:global=4")
            .arg("-slave");
        if request.is_webstream {
            command
                .arg("-endpos")
                .arg(request.duration.to_string())
                .arg("-cache")
                .arg(request.cache.unwrap_or(0).to_string());
        }
        command
            .arg("-input")
            .arg(format!("file=/dev/fd/{slave_read_fd}"))
            .arg(&request.filename)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(errorlog);

        // SAFETY: runs between fork and exec in the child only. It detaches
        // from our process group and arranges for the child to die with us;
        // it must not touch std's own internal exec-status pipe, which is
        // why fd hygiene here is limited to the one extra fd we opened by
        // hand (`slave_write_fd`, marked close-on-exec above) rather than a
        // blanket close loop.
        unsafe {
            command.pre_exec(move || {
                #[cfg(target_os = "linux")]
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(Error::SpawnFailed)?;
        // SAFETY: closing our copy of the fd the child now owns its own copy of.
        unsafe {
            libc::close(slave_read_fd);
        }

        let stdout = child.stdout.take().expect("stdout was piped");
        let (answers_tx, answers_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if answers_tx.send(line.trim_end().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // SAFETY: `slave_write_fd` is a just-created, still-valid, uniquely-owned fd.
        let commands = unsafe { File::from_raw_fd(slave_write_fd) };

        Ok(RunningProcess {
            child,
            commands,
            answers: answers_rx,
            last_alive: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_idle() {
        let session = PlayerSession::new(SessionConfig::default());
        let state = session.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.now_playing.is_none());
    }

    #[test]
    fn play_with_missing_binary_returns_spawn_failed() {
        let session = PlayerSession::new(SessionConfig {
            player_path: "/nonexistent/definitely-not-a-binary".into(),
            ..SessionConfig::default()
        });
        let err = session
            .play(&PlayRequest::local("track.mp3"))
            .expect_err("missing binary fails to spawn");
        assert!(matches!(err, Error::SpawnFailed(_)));
    }

    #[test]
    fn unresponsive_subprocess_is_killed_after_the_liveness_timeout() {
        // `yes` runs forever, echoing its (ignored, mplayer-shaped) flags to
        // stdout, and never answers a `get_property` on the slave pipe --
        // standing in for a hung player. The liveness poll should declare
        // it dead and kill the whole process group well within a few
        // polling intervals.
        let session = PlayerSession::new(SessionConfig {
            player_path: "yes".into(),
            timeout: Duration::from_millis(300),
            ..SessionConfig::default()
        });
        let started = Instant::now();
        session
            .play(&PlayRequest::local("hung.mp3"))
            .expect("yes spawns fine");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(session.state().phase, Phase::Idle);
    }
}
