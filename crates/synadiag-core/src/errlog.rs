//! Bounded diagnostic message log

/// Maximum number of retained messages
pub const MAX_ERROR_MESSAGES: usize = 32;

/// Human-readable error messages collected across operations
///
/// Messages past [`MAX_ERROR_MESSAGES`] are dropped.
#[derive(Debug, Default, Clone)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error_msg(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::error!("{}", msg);
        if self.entries.len() < MAX_ERROR_MESSAGES {
            self.entries.push(msg);
        }
    }

    pub fn clear_all_error_msg(&mut self) {
        self.entries.clear();
    }

    pub fn get_num_err_msg(&self) -> usize {
        self.entries.len()
    }

    pub fn get_err_msg(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let mut log = ErrorLog::new();
        for i in 0..40 {
            log.add_error_msg(format!("error {}", i));
        }
        assert_eq!(log.get_num_err_msg(), MAX_ERROR_MESSAGES);
        assert_eq!(log.get_err_msg(0), Some("error 0"));
        assert_eq!(log.get_err_msg(31), Some("error 31"));
        assert_eq!(log.get_err_msg(32), None);
        log.clear_all_error_msg();
        assert_eq!(log.get_num_err_msg(), 0);
    }
}
