use std::time::{Duration, SystemTime};

pub trait SystemTimeExt {
    fn to_epoch_millis(&self) -> u64;
    fn from_epoch_millis(millis: u64) -> Self;
}

impl SystemTimeExt for SystemTime {
    fn to_epoch_millis(&self) -> u64 {
        self.duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn from_epoch_millis(millis: u64) -> Self {
        SystemTime::UNIX_EPOCH + Duration::from_millis(millis)
    }
}
