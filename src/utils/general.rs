use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use tokio::sync::broadcast;

static KILL: LazyLock<(broadcast::Sender<()>, broadcast::Receiver<()>)> =
    LazyLock::new(|| broadcast::channel(1));

static KILLED: AtomicBool = AtomicBool::new(false);

pub async fn listen_for_ctrl_c() {
    tokio::signal::ctrl_c().await.ok();

    KILL.0.send(()).ok();

    KILLED.store(true, Ordering::Relaxed);
}

pub async fn ctrl_c() {
    if KILLED.load(Ordering::Relaxed) {
        return;
    }

    KILL.0.subscribe().recv().await.ok();
}

pub struct Clock;

impl Clock {
    /// UTC wall time without sub-seconds, the way timestamps are stored in DB
    #[must_use]
    pub fn now() -> NaiveDateTime {
        Utc::now().naive_utc().round_subsecs(0)
    }
}

pub trait StringUtils {
    fn chars_len(&self) -> usize;

    fn chars_crop(&self, len: usize) -> String;
}

impl<T> StringUtils for T
where
    T: AsRef<str>,
{
    fn chars_len(&self) -> usize {
        self.as_ref().chars().count()
    }

    fn chars_crop(&self, len: usize) -> String {
        self.as_ref().chars().take(len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chars_len_ascii() {
        assert_eq!("hello".chars_len(), 5);
    }

    #[test]
    fn test_chars_len_empty() {
        assert_eq!("".chars_len(), 0);
    }

    #[test]
    fn test_chars_len_cyrillic() {
        // two bytes per letter, one char each
        assert_eq!("Привет".chars_len(), 6);
        assert_eq!("Привет".len(), 12);
    }

    #[test]
    fn test_chars_len_emoji() {
        assert_eq!("💎🪙".chars_len(), 2);
    }

    #[test]
    fn test_chars_crop_cyrillic() {
        assert_eq!("Привет мир".chars_crop(6), "Привет");
    }

    #[test]
    fn test_chars_crop_longer_than_string() {
        assert_eq!("hi".chars_crop(10), "hi");
    }

    #[test]
    fn test_clock_now_subsecond_precision() {
        let now = Clock::now();

        assert_eq!(now.and_utc().timestamp_subsec_nanos(), 0);
    }
}
