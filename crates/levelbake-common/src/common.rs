// common.rs — console output and progress reporting used by both pipelines

use std::cell::RefCell;

pub const ERR_FATAL: i32 = 0; // abort the whole build
pub const ERR_DROP: i32 = 1; // report and keep going

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

thread_local! {
    static RD_BUFFER: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Begin redirecting printf output into a buffer (per thread).
pub fn com_begin_redirect() {
    RD_BUFFER.with(|b| *b.borrow_mut() = Some(String::new()));
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.with(|b| b.borrow_mut().take())
}

/// Append to the redirect buffer if one is active. Returns true if captured.
fn redirect(prefix: &str, msg: &str) -> bool {
    RD_BUFFER.with(|b| {
        if let Some(ref mut s) = *b.borrow_mut() {
            s.push_str(prefix);
            s.push_str(msg);
            if !msg.ends_with('\n') {
                s.push('\n');
            }
            true
        } else {
            false
        }
    })
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Error
// ============================================================

/// General-purpose print.
pub fn com_printf(msg: &str) {
    if redirect("", msg) {
        return;
    }
    log::info!("{}", msg.trim_end());
}

/// Developer-only print. Filtered by the log level of the host.
pub fn com_dprintf(msg: &str) {
    if redirect("", msg) {
        return;
    }
    log::debug!("{}", msg.trim_end());
}

/// Warning print for recoverable conditions (truncation, eviction, oracle failure).
pub fn com_warnf(msg: &str) {
    if redirect("WARNING: ", msg) {
        return;
    }
    log::warn!("{}", msg.trim_end());
}

/// Error report. Unlike the engine version this never exits the process:
/// `ERR_FATAL` is returned to the caller as a vital build error instead.
pub fn com_error(code: i32, msg: &str) {
    let prefix = if code == ERR_FATAL { "FATAL: " } else { "ERROR: " };
    if redirect(prefix, msg) {
        return;
    }
    log::error!("{}{}", prefix, msg.trim_end());
}

// ============================================================
// Slow task progress
// ============================================================

/// Advisory progress for long builds. Reports every 10% through the
/// developer channel; it never interrupts the work being measured.
pub struct SlowTask {
    title: String,
    last_tenth: i32,
    active: bool,
}

impl SlowTask {
    pub fn begin(title: &str) -> Self {
        com_dprintf(&format!("{}...\n", title));
        Self {
            title: title.to_string(),
            last_tenth: -1,
            active: true,
        }
    }

    pub fn update(&mut self, done: usize, total: usize) {
        if !self.active || total == 0 {
            return;
        }
        let tenth = ((done.min(total) * 10) / total) as i32;
        if tenth != self.last_tenth {
            self.last_tenth = tenth;
            com_dprintf(&format!("{}: {}%\n", self.title, tenth * 10));
        }
    }

    pub fn end(&mut self) {
        if self.active {
            self.active = false;
            com_dprintf(&format!("{}: done\n", self.title));
        }
    }

    pub fn percent(&self) -> i32 {
        self.last_tenth.max(0) * 10
    }
}

impl Drop for SlowTask {
    fn drop(&mut self) {
        self.end();
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_captures_levels() {
        com_begin_redirect();
        com_printf("hello");
        com_warnf("marker table full\n");
        com_error(ERR_DROP, "bad leaf");
        let out = com_end_redirect().unwrap();
        assert!(out.contains("hello\n"));
        assert!(out.contains("WARNING: marker table full\n"));
        assert!(out.contains("ERROR: bad leaf\n"));
        assert!(com_end_redirect().is_none());
    }

    #[test]
    fn test_slow_task_reports_tenths() {
        com_begin_redirect();
        {
            let mut task = SlowTask::begin("Building zones");
            for i in 0..=20 {
                task.update(i, 20);
            }
            assert_eq!(task.percent(), 100);
        }
        let out = com_end_redirect().unwrap();
        assert!(out.contains("Building zones: 50%"));
        assert!(out.contains("Building zones: done"));
        // one line per tenth, not per update
        assert_eq!(out.matches("Building zones: 50%").count(), 1);
    }

    #[test]
    fn test_slow_task_zero_total_is_silent() {
        com_begin_redirect();
        let mut task = SlowTask::begin("Empty");
        task.update(0, 0);
        task.end();
        task.end();
        let out = com_end_redirect().unwrap();
        assert_eq!(out.matches("Empty: done").count(), 1);
        assert!(!out.contains('%'));
    }
}
