//! Reconciliation engine: decides whether a proposed delivery may be
//! committed against the production records.

use crate::error::{TrackerError, ValidationError};
use crate::types::{DeliveryEntry, ProductionEntry, TakaRange};

/// A proposed delivery, before validation.
///
/// `machine_number` may be omitted (scan flows capture only taka and
/// meter); validation then resolves it from the production entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryCandidate {
    pub taka_number: String,
    pub meter: String,
    pub machine_number: Option<String>,
}

impl DeliveryCandidate {
    pub fn new(taka_number: impl Into<String>, meter: impl Into<String>) -> Self {
        Self {
            taka_number: taka_number.into(),
            meter: meter.into(),
            machine_number: None,
        }
    }

    pub fn with_machine_number(mut self, machine_number: impl Into<String>) -> Self {
        self.machine_number = Some(machine_number.into());
        self
    }
}

/// Validate one delivery candidate.
///
/// The search space is restricted to `list_range` when one is active
/// (inactive ranges pass everything). Field comparisons are exact string
/// compares: the handwritten forms must match what was recorded at
/// production time, with no numeric tolerance.
///
/// On success returns the resolved machine number for constructing the
/// delivery entry.
pub fn validate(
    candidate: &DeliveryCandidate,
    production_entries: &[ProductionEntry],
    delivery_entries: &[DeliveryEntry],
    list_range: Option<&TakaRange>,
) -> Result<String, ValidationError> {
    let in_scope = |entry: &&ProductionEntry| match list_range {
        Some(range) => range.contains(&entry.taka_number),
        None => true,
    };

    let production = production_entries
        .iter()
        .filter(in_scope)
        .find(|p| p.taka_number == candidate.taka_number)
        .ok_or_else(|| ValidationError::TakaNotFound(candidate.taka_number.clone()))?;

    if let Some(machine_number) = &candidate.machine_number {
        if machine_number != &production.machine_number {
            return Err(ValidationError::MachineMismatch {
                taka_number: candidate.taka_number.clone(),
                expected: production.machine_number.clone(),
                got: machine_number.clone(),
            });
        }
    }

    if candidate.meter != production.meter {
        return Err(ValidationError::MeterMismatch {
            taka_number: candidate.taka_number.clone(),
            expected: production.meter.clone(),
            got: candidate.meter.clone(),
        });
    }

    if delivery_entries
        .iter()
        .any(|d| d.taka_number == candidate.taka_number)
    {
        return Err(ValidationError::AlreadyDelivered(
            candidate.taka_number.clone(),
        ));
    }

    Ok(production.machine_number.clone())
}

/// Validate a whole batch, all-or-nothing.
///
/// Every candidate is validated against the current state; the first
/// failure rejects the batch with its index and nothing may be committed.
/// Candidates sharing a taka number within the batch are rejected
/// outright: independent validation cannot see them, and committing both
/// would break the one-delivery-per-taka invariant.
///
/// Returns the resolved machine numbers, index-aligned with the input.
pub fn validate_batch(
    candidates: &[DeliveryCandidate],
    production_entries: &[ProductionEntry],
    delivery_entries: &[DeliveryEntry],
    list_range: Option<&TakaRange>,
) -> Result<Vec<String>, TrackerError> {
    let mut resolved = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        if candidates[..index]
            .iter()
            .any(|earlier| earlier.taka_number == candidate.taka_number)
        {
            return Err(TrackerError::BatchValidation {
                index,
                cause: ValidationError::DuplicateInBatch(candidate.taka_number.clone()),
            });
        }

        let machine = validate(candidate, production_entries, delivery_entries, list_range)
            .map_err(|cause| TrackerError::BatchValidation { index, cause })?;
        resolved.push(machine);
    }

    Ok(resolved)
}

/// Next transport-pack number: one past the highest already assigned.
pub fn next_tp_number(delivery_entries: &[DeliveryEntry]) -> u32 {
    delivery_entries
        .iter()
        .filter_map(|d| d.tp_number)
        .max()
        .unwrap_or(0)
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production(taka: &str, machine: &str, meter: &str) -> ProductionEntry {
        ProductionEntry::new(taka, machine, meter, "15/8/25").unwrap()
    }

    fn delivered(id: &str, taka: &str, tp: Option<u32>) -> DeliveryEntry {
        let mut entry =
            DeliveryEntry::new(id, "Patel & Sons", "L-3", "16/08/2025", taka, "120", "10").unwrap();
        entry.tp_number = tp;
        entry
    }

    #[test]
    fn test_validate_resolves_machine_number() {
        let production = vec![production("2417", "10", "120")];
        let candidate = DeliveryCandidate::new("2417", "120");

        let machine = validate(&candidate, &production, &[], None).unwrap();
        assert_eq!(machine, "10");
    }

    #[test]
    fn test_validate_meter_mismatch() {
        let production = vec![production("2417", "10", "120")];
        let candidate = DeliveryCandidate::new("2417", "121");

        let err = validate(&candidate, &production, &[], None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MeterMismatch {
                taka_number: "2417".into(),
                expected: "120".into(),
                got: "121".into(),
            }
        );
    }

    #[test]
    fn test_validate_machine_mismatch() {
        let production = vec![production("2417", "10", "120")];
        let candidate = DeliveryCandidate::new("2417", "120").with_machine_number("11");

        let err = validate(&candidate, &production, &[], None).unwrap_err();
        assert!(matches!(err, ValidationError::MachineMismatch { .. }));
    }

    #[test]
    fn test_validate_unknown_taka() {
        let err = validate(&DeliveryCandidate::new("2417", "120"), &[], &[], None).unwrap_err();
        assert_eq!(err, ValidationError::TakaNotFound("2417".into()));
    }

    #[test]
    fn test_validate_already_delivered() {
        let production = vec![production("2417", "10", "120")];
        let deliveries = vec![delivered("d1", "2417", None)];
        let candidate = DeliveryCandidate::new("2417", "120");

        let err = validate(&candidate, &production, &deliveries, None).unwrap_err();
        assert_eq!(err, ValidationError::AlreadyDelivered("2417".into()));
    }

    #[test]
    fn test_meter_compare_is_exact_text() {
        // "120" and "120.00" denote the same length but are different
        // handwritten forms; the engine must not accept them as equal.
        let production = vec![production("2417", "10", "120.00")];
        let candidate = DeliveryCandidate::new("2417", "120");

        assert!(validate(&candidate, &production, &[], None).is_err());
    }

    #[test]
    fn test_list_range_restricts_search_space() {
        let production = vec![production("2417", "10", "120")];
        let out_of_range = TakaRange {
            start: "3000".into(),
            end: "4000".into(),
        };
        let in_range = TakaRange {
            start: "2400".into(),
            end: "2500".into(),
        };
        let candidate = DeliveryCandidate::new("2417", "120");

        let err = validate(&candidate, &production, &[], Some(&out_of_range)).unwrap_err();
        assert_eq!(err, ValidationError::TakaNotFound("2417".into()));

        assert!(validate(&candidate, &production, &[], Some(&in_range)).is_ok());
    }

    #[test]
    fn test_inactive_range_is_noop_filter() {
        let production = vec![production("2417", "10", "120")];
        let inactive = TakaRange::default();
        let candidate = DeliveryCandidate::new("2417", "120");

        assert!(validate(&candidate, &production, &[], Some(&inactive)).is_ok());
    }

    #[test]
    fn test_batch_all_or_nothing() {
        let production = vec![
            production("2417", "10", "120"),
            production("2418", "11", "95"),
        ];
        let candidates = vec![
            DeliveryCandidate::new("2417", "120"),
            DeliveryCandidate::new("2418", "96"), // wrong meter
        ];

        let err = validate_batch(&candidates, &production, &[], None).unwrap_err();
        match err {
            TrackerError::BatchValidation { index, cause } => {
                assert_eq!(index, 1);
                assert!(matches!(cause, ValidationError::MeterMismatch { .. }));
            }
            other => panic!("expected BatchValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_rejects_duplicate_taka() {
        let production = vec![production("2417", "10", "120")];
        let candidates = vec![
            DeliveryCandidate::new("2417", "120"),
            DeliveryCandidate::new("2417", "120"),
        ];

        let err = validate_batch(&candidates, &production, &[], None).unwrap_err();
        match err {
            TrackerError::BatchValidation { index, cause } => {
                assert_eq!(index, 1);
                assert_eq!(cause, ValidationError::DuplicateInBatch("2417".into()));
            }
            other => panic!("expected BatchValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_resolves_all_machines() {
        let production = vec![
            production("2417", "10", "120"),
            production("2418", "11", "95"),
        ];
        let candidates = vec![
            DeliveryCandidate::new("2417", "120"),
            DeliveryCandidate::new("2418", "95"),
        ];

        let machines = validate_batch(&candidates, &production, &[], None).unwrap();
        assert_eq!(machines, vec!["10".to_string(), "11".to_string()]);
    }

    #[test]
    fn test_next_tp_number() {
        assert_eq!(next_tp_number(&[]), 1);

        let deliveries = vec![
            delivered("d1", "2417", Some(3)),
            delivered("d2", "2418", None),
            delivered("d3", "2419", Some(7)),
        ];
        assert_eq!(next_tp_number(&deliveries), 8);
    }
}
