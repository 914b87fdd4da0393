//! Option list merging for selectable fields.

use std::collections::HashSet;

use crate::types::FormFieldOption;

/// Merge `learned` options into `base`, deduplicated by value.
///
/// Base options come first and win on collision; learned options whose value
/// is new are appended in arrival order.
pub fn merge_options(base: &[FormFieldOption], learned: &[FormFieldOption]) -> Vec<FormFieldOption> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(base.len() + learned.len());
    let mut merged = Vec::with_capacity(base.len() + learned.len());

    for option in base.iter().chain(learned.iter()) {
        if seen.insert(option.value.as_str()) {
            merged.push(option.clone());
        }
    }

    merged
}

/// Merge any number of option layers in order, first-seen value winning.
pub fn merge_option_layers<'a, I>(layers: I) -> Vec<FormFieldOption>
where
    I: IntoIterator<Item = &'a [FormFieldOption]>,
{
    layers
        .into_iter()
        .fold(Vec::new(), |acc, layer| merge_options(&acc, layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(value: &str, label: &str) -> FormFieldOption {
        FormFieldOption::new(value, label)
    }

    #[test]
    fn test_base_wins_and_new_appended() {
        let merged = merge_options(&[opt("a", "A")], &[opt("a", "A2"), opt("b", "B")]);
        assert_eq!(merged, vec![opt("a", "A"), opt("b", "B")]);
    }

    #[test]
    fn test_duplicates_within_learned_collapse() {
        let merged = merge_options(&[], &[opt("x", "X"), opt("y", "Y"), opt("x", "X again")]);
        assert_eq!(merged, vec![opt("x", "X"), opt("y", "Y")]);
    }

    #[test]
    fn test_layers_keep_order() {
        let schema = [opt("general", "General")];
        let fetched = [opt("missions", "Missions"), opt("general", "General Fund")];
        let learned = [opt("youth-ministry", "Youth Ministry")];

        let merged = merge_option_layers([&schema[..], &fetched[..], &learned[..]]);
        let values: Vec<&str> = merged.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["general", "missions", "youth-ministry"]);
        assert_eq!(merged[0].label, "General");
    }
}
