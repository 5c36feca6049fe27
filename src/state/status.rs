//! Reading status transitions
//!
//! Changing a record's status decides what happens to its completion
//! timestamp. Status and `read_date` are always written together.

use super::data::{BookRecord, BookStatus, Timestamp};

/// Completion timestamp after moving from `previous_status` to `new_status`.
///
/// - entering `Read` stamps `now`
/// - any non-`Read` status clears the date
/// - staying in `Read` keeps the previous date
pub fn compute_read_date(
    previous_status: BookStatus,
    previous_read_date: Option<Timestamp>,
    new_status: BookStatus,
    now: Timestamp,
) -> Option<Timestamp> {
    if !previous_status.is_read() && new_status.is_read() {
        Some(now)
    } else if !new_status.is_read() {
        None
    } else {
        previous_read_date
    }
}

impl BookRecord {
    /// Set `status` and recompute `read_date` in one step.
    pub fn apply_status(&mut self, status: BookStatus, now: Timestamp) {
        self.read_date = compute_read_date(self.status, self.read_date, status, now);
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(ms: i64) -> Timestamp {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_entering_read_stamps_now() {
        assert_eq!(
            compute_read_date(BookStatus::Unread, None, BookStatus::Read, at(10)),
            Some(at(10))
        );
        assert_eq!(
            compute_read_date(BookStatus::Reading, None, BookStatus::Read, at(20)),
            Some(at(20))
        );
    }

    #[test]
    fn test_leaving_read_clears_date() {
        assert_eq!(
            compute_read_date(BookStatus::Read, Some(at(10)), BookStatus::Unread, at(30)),
            None
        );
        assert_eq!(
            compute_read_date(BookStatus::Read, Some(at(10)), BookStatus::Reading, at(30)),
            None
        );
    }

    #[test]
    fn test_staying_read_keeps_date() {
        assert_eq!(
            compute_read_date(BookStatus::Read, Some(at(10)), BookStatus::Read, at(99)),
            Some(at(10))
        );
    }

    #[test]
    fn test_non_read_transitions_never_have_date() {
        for from in [BookStatus::Unread, BookStatus::Reading] {
            for to in [BookStatus::Unread, BookStatus::Reading] {
                assert_eq!(compute_read_date(from, None, to, at(5)), None);
            }
        }
    }

    #[test]
    fn test_read_date_tracks_latest_completion() {
        let mut book = BookRecord::new("Dune", "Frank Herbert", at(0));
        let steps = [
            (BookStatus::Reading, 1),
            (BookStatus::Read, 2),
            (BookStatus::Read, 3),
            (BookStatus::Unread, 4),
            (BookStatus::Read, 5),
            (BookStatus::Reading, 6),
            (BookStatus::Read, 7),
        ];

        let mut last_entered_read = None;
        for (status, ms) in steps {
            let was_read = book.status.is_read();
            book.apply_status(status, at(ms));
            if status.is_read() && !was_read {
                last_entered_read = Some(at(ms));
            }

            assert_eq!(book.read_date.is_some(), book.status.is_read());
            if book.status.is_read() {
                assert_eq!(book.read_date, last_entered_read);
            }
        }
        assert_eq!(book.read_date, Some(at(7)));
    }

    #[test]
    fn test_edit_scenario() {
        let mut book = BookRecord::new("Dune", "Frank Herbert", at(0));
        book.apply_status(BookStatus::Read, at(1_000));
        assert_eq!(book.read_date, Some(at(1_000)));

        book.apply_status(BookStatus::Unread, at(2_000));
        assert_eq!(book.read_date, None);
    }
}
