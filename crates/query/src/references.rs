use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Ids kept per reference list before the rest collapse into `+more`.
pub const MAX_REFERENCE_IDS: usize = 5;

static DATA_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Data:([^\]]*)\]").expect("valid regex"));
static ID_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z][A-Za-z ]*?\s*)\(([^)]*)\)").expect("valid regex"));

/// `None` when the list is short enough to keep as written.
fn collapse_ids(list: &str) -> Option<String> {
    let ids: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "+more")
        .collect();
    if ids.len() <= MAX_REFERENCE_IDS {
        return None;
    }
    let mut kept = ids[..MAX_REFERENCE_IDS].to_vec();
    kept.push("+more");
    Some(kept.join(", "))
}

/// Rewrite every `[Data: Dataset (ids); ...]` reference so that no list holds
/// more than five ids. Longer lists keep their first five and end in `+more`;
/// everything else, shorter lists included, is kept verbatim.
pub fn collapse_data_references(text: &str) -> String {
    DATA_BLOCK
        .replace_all(text, |block: &Captures| {
            let inner = ID_LIST.replace_all(&block[1], |list: &Captures| match collapse_ids(&list[2]) {
                Some(ids) => format!("{}({})", &list[1], ids),
                None => list[0].to_string(),
            });
            format!("[Data:{}]", inner)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_lists_keep_first_five() {
        let text = "Apple grew [Data: Reports (1, 2, 3, 4, 5, 6, 7, 8)].";
        assert_eq!(
            collapse_data_references(text),
            "Apple grew [Data: Reports (1, 2, 3, 4, 5, +more)]."
        );
    }

    #[test]
    fn short_lists_are_untouched() {
        let text = "See [Data: Entities (5, 7); Relationships (23, 2, 34, 46, 64, +more)] and more.";
        assert_eq!(collapse_data_references(text), text);
    }

    #[test]
    fn short_lists_keep_their_spelling() {
        let text = "Jobs [Data: Reports (1,2); Entities(6)].";
        assert_eq!(collapse_data_references(text), text);

        let text = "[Data: Relationships (37, 38, 39, 40, 41,+more)]";
        assert_eq!(collapse_data_references(text), text);
    }

    #[test]
    fn compact_long_lists_keep_their_dataset_name() {
        assert_eq!(
            collapse_data_references("[Data: Entities(1,2,3,4,5,6)]"),
            "[Data: Entities(1, 2, 3, 4, 5, +more)]"
        );
    }

    #[test]
    fn every_list_in_a_block_is_collapsed() {
        let text = "[Data: Sources (1, 2, 3, 4, 5, 6); Entities (9, 8, 7, 6, 5, 4, +more)]";
        assert_eq!(
            collapse_data_references(text),
            "[Data: Sources (1, 2, 3, 4, 5, +more); Entities (9, 8, 7, 6, 5, +more)]"
        );
    }

    #[test]
    fn collapsing_is_idempotent() {
        let once = collapse_data_references("x [Data: Reports (10, 11, 12, 13, 14, 15, 16)] y");
        assert_eq!(collapse_data_references(&once), once);
    }

    #[test]
    fn text_without_references_is_unchanged() {
        let text = "Plain answer (with parentheses, commas, 1, 2, 3, 4, 5, 6).";
        assert_eq!(collapse_data_references(text), text);
    }
}
