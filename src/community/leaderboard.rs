//! Leaderboard formatting
//!
//! Read-only consumer of reputation snapshots; produces the text blocks
//! used by the daily digest and the `leaderboard` command glue.

use crate::reputation::MemberRecord;

/// Top `n` members by reputation, ties broken by message count.
pub fn top_members(records: &[MemberRecord], n: usize) -> Vec<&MemberRecord> {
    let mut ranked: Vec<&MemberRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        b.reputation
            .partial_cmp(&a.reputation)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.messages_sent.cmp(&a.messages_sent))
    });
    ranked.truncate(n);
    ranked
}

/// Human-readable leaderboard block.
pub fn format_leaderboard(records: &[MemberRecord], n: usize) -> String {
    let ranked = top_members(records, n);
    if ranked.is_empty() {
        return "Top members by reputation\n\nNo members found yet.".to_string();
    }

    let mut text = "Top members by reputation\n\n".to_string();
    for (index, record) in ranked.iter().enumerate() {
        text.push_str(&format!(
            "{}. member {} - reputation {:.2} | messages {}\n",
            index + 1,
            record.member_id,
            record.reputation,
            record.messages_sent
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(member_id: i64, reputation: f64, messages_sent: u64) -> MemberRecord {
        let now = Utc::now();
        MemberRecord {
            member_id,
            reputation,
            messages_sent,
            tickets_opened: 0,
            joined_at: now,
            last_active: now,
        }
    }

    #[test]
    fn test_ranking_orders_by_reputation() {
        let records = vec![record(1, 40.0, 10), record(2, 90.0, 5), record(3, 60.0, 7)];
        let top = top_members(&records, 2);
        assert_eq!(top[0].member_id, 2);
        assert_eq!(top[1].member_id, 3);
    }

    #[test]
    fn test_ties_break_on_messages() {
        let records = vec![record(1, 50.0, 3), record(2, 50.0, 9)];
        let top = top_members(&records, 2);
        assert_eq!(top[0].member_id, 2);
    }

    #[test]
    fn test_format_empty_and_populated() {
        assert!(format_leaderboard(&[], 10).contains("No members found yet"));

        let records = vec![record(7, 55.5, 12)];
        let text = format_leaderboard(&records, 10);
        assert!(text.contains("1. member 7 - reputation 55.50 | messages 12"));
    }
}
