// Unit tests for Match Review

use match_review::core::{QueuedCandidate, ReviewQueue, UndoBuffer, UndoEntry};
use match_review::models::{CandidateGroup, MatchCandidate, ValidationLabel};

fn create_candidates(prefix: &str, n: usize) -> Vec<MatchCandidate> {
    (0..n)
        .map(|i| {
            MatchCandidate::new(
                format!("{} {} a", prefix, i),
                format!("{} {} b", prefix, i),
                0.5 + i as f64 / 100.0,
                70.0 + i as f64,
            )
        })
        .collect()
}

fn seeded(ambiguous: usize, confident: usize) -> ReviewQueue {
    let mut queue = ReviewQueue::new();
    queue.seed(create_candidates("amb", ambiguous), create_candidates("conf", confident));
    queue
}

/// Concatenate every page and check it against the live queue
fn assert_pages_cover_queue(queue: &ReviewQueue, page_size: usize) {
    let total_pages = queue.total_pages(page_size).unwrap();
    let mut seen: Vec<QueuedCandidate> = Vec::new();
    let mut sizes = 0;

    for number in 1..=total_pages {
        let page = queue.page(number, page_size).unwrap();
        assert_eq!(page.number, number);
        assert_eq!(page.offset, seen.len());
        assert!(page.len() <= page_size);
        sizes += page.len();
        seen.extend(page.entries.iter().cloned());
    }

    assert_eq!(sizes, queue.len());
    assert_eq!(seen.as_slice(), queue.as_slice());
}

/// Small deterministic generator so removal patterns vary without extra crates
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

#[test]
fn test_twelve_ambiguous_three_confident_pages() {
    let queue = seeded(12, 3);

    let first = queue.page(1, 10).unwrap();
    assert_eq!(first.len(), 10);
    assert!(first.entries.iter().all(|e| e.group == CandidateGroup::Ambiguous));

    let second = queue.page(2, 10).unwrap();
    assert_eq!(second.len(), 5);
    let groups: Vec<_> = second.entries.iter().map(|e| e.group).collect();
    assert_eq!(
        groups,
        vec![
            CandidateGroup::Ambiguous,
            CandidateGroup::Ambiguous,
            CandidateGroup::Confident,
            CandidateGroup::Confident,
            CandidateGroup::Confident,
        ]
    );
}

#[test]
fn test_pages_cover_queue_through_removals() {
    let mut rng = Lcg(42);

    for page_size in [1, 3, 7, 10] {
        for (ambiguous, confident) in [(0, 0), (1, 0), (12, 3), (9, 11), (25, 0)] {
            let mut queue = seeded(ambiguous, confident);
            assert_pages_cover_queue(&queue, page_size);

            while !queue.is_empty() {
                let index = rng.below(queue.len());
                let before = queue.len();
                assert!(queue.remove_at(index).is_some());
                assert_eq!(queue.len(), before - 1);
                assert_pages_cover_queue(&queue, page_size);
            }
        }
    }
}

#[test]
fn test_removal_keeps_relative_order() {
    let mut queue = seeded(5, 2);
    let before: Vec<_> = queue.iter().map(|e| e.id).collect();

    queue.remove_at(3);
    let after: Vec<_> = queue.iter().map(|e| e.id).collect();

    let mut expected = before.clone();
    expected.remove(3);
    assert_eq!(after, expected);
    assert_eq!(queue.ambiguous_remaining(), 4);
}

#[test]
fn test_removal_pulls_next_page_entry_forward() {
    let mut queue = seeded(12, 3);
    let first_of_page_two = queue.page(2, 10).unwrap().entries[0].id;

    queue.remove_at(4);
    let page_one = queue.page(1, 10).unwrap();
    assert_eq!(page_one.entries[9].id, first_of_page_two);
    assert_eq!(queue.page(2, 10).unwrap().len(), 4);
}

#[test]
fn test_page_request_past_end_after_shrinking() {
    let mut queue = seeded(11, 0);
    assert_eq!(queue.total_pages(10).unwrap(), 2);

    queue.remove_at(10);
    let page = queue.page(2, 10).unwrap();
    assert_eq!(page.number, 1);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.len(), 10);
}

#[test]
fn test_validate_then_undo_round_trip_locally() {
    let mut queue = seeded(12, 3);
    let mut buffer = UndoBuffer::new();
    let original_len = queue.len();
    let id = queue.id_at(7).unwrap();

    let (position, entry) = queue.remove(id).unwrap();
    buffer.push(UndoEntry::new(entry, ValidationLabel::NonMatch, position));
    assert_eq!(queue.len(), original_len - 1);
    assert_eq!(buffer.peek().unwrap().position, 7);

    let undo = buffer.take().unwrap();
    queue.insert_at_head(undo.pending_entry());
    assert_eq!(queue.len(), original_len);
    assert_eq!(queue.position_of(id), Some(0));
    assert!(buffer.take().is_none());
}

#[test]
fn test_undo_buffer_holds_only_latest() {
    let mut queue = seeded(4, 0);
    let mut buffer = UndoBuffer::new();

    for _ in 0..3 {
        let id = queue.id_at(0).unwrap();
        let (position, entry) = queue.remove(id).unwrap();
        buffer.push(UndoEntry::new(entry, ValidationLabel::Match, position));
    }

    let last = buffer.take().unwrap();
    assert_eq!(last.entry.candidate.combined_key_a, "amb 2 a");
    assert!(buffer.is_empty());
}
