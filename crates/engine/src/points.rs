use std::sync::Arc;

use uuid::Uuid;

use infra::ledger::NewPointBand;
use infra::models::PointBandRow;
use infra::LedgerStore;

use crate::error::{LifecycleError, LifecycleResult};

/// Points and prize share awarded for one finishing place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacePoints {
    pub points: i32,
    pub prize_percentage: f64,
}

impl PlacePoints {
    pub const NONE: PlacePoints = PlacePoints {
        points: 0,
        prize_percentage: 0.0,
    };
}

/// Reject bands that overlap, leave gaps, or do not start at place 1.
pub fn validate_bands(bands: &[NewPointBand]) -> LifecycleResult<()> {
    let mut sorted: Vec<&NewPointBand> = bands.iter().collect();
    sorted.sort_by_key(|b| b.place_from);

    let mut next_place = 1;
    let mut total_percentage = 0.0;
    for band in sorted {
        if band.place_from < 1 || band.place_from > band.place_to {
            return Err(LifecycleError::PreconditionFailed(format!(
                "invalid place range {}..={}",
                band.place_from, band.place_to
            )));
        }
        if band.points < 0 {
            return Err(LifecycleError::PreconditionFailed(format!(
                "negative points for places {}..={}",
                band.place_from, band.place_to
            )));
        }
        if !(0.0..=100.0).contains(&band.prize_percentage) {
            return Err(LifecycleError::PreconditionFailed(format!(
                "prize percentage {} out of range",
                band.prize_percentage
            )));
        }
        if band.place_from < next_place {
            return Err(LifecycleError::PreconditionFailed(format!(
                "band starting at place {} overlaps a previous band",
                band.place_from
            )));
        }
        if band.place_from > next_place {
            return Err(LifecycleError::PreconditionFailed(format!(
                "no band covers place {}",
                next_place
            )));
        }

        total_percentage += band.prize_percentage;
        next_place = band.place_to.checked_add(1).ok_or_else(|| {
            LifecycleError::PreconditionFailed(format!(
                "place {} is out of range",
                band.place_to
            ))
        })?;
    }

    if total_percentage > 100.0 + f64::EPSILON {
        return Err(LifecycleError::PreconditionFailed(format!(
            "prize percentages add up to {}",
            total_percentage
        )));
    }

    Ok(())
}

/// Look up the band covering `place`.
pub fn resolve_place(bands: &[PointBandRow], place: i32) -> PlacePoints {
    bands
        .iter()
        .find(|b| b.place_from <= place && place <= b.place_to)
        .map(|b| PlacePoints {
            points: b.points,
            prize_percentage: b.prize_percentage,
        })
        .unwrap_or(PlacePoints::NONE)
}

#[derive(Clone)]
pub struct PointStructureResolver {
    ledger: Arc<dyn LedgerStore>,
}

impl PointStructureResolver {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Validate and atomically replace the tournament's bands.
    pub async fn set_point_structure(
        &self,
        tournament_id: Uuid,
        bands: &[NewPointBand],
    ) -> LifecycleResult<Vec<PointBandRow>> {
        validate_bands(bands)?;
        Ok(self
            .ledger
            .replace_point_structure(tournament_id, bands)
            .await?)
    }

    pub async fn bands_for(&self, tournament_id: Uuid) -> LifecycleResult<Vec<PointBandRow>> {
        Ok(self.ledger.list_point_bands(tournament_id).await?)
    }

    /// `{0, 0}` when no band covers the place.
    pub async fn points_for_place(
        &self,
        tournament_id: Uuid,
        place: i32,
    ) -> LifecycleResult<PlacePoints> {
        let bands = self.bands_for(tournament_id).await?;
        Ok(resolve_place(&bands, place))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(place_from: i32, place_to: i32, points: i32, prize_percentage: f64) -> NewPointBand {
        NewPointBand {
            place_from,
            place_to,
            points,
            prize_percentage,
        }
    }

    #[test]
    fn test_contiguous_bands_pass_in_any_order() {
        let bands = vec![band(4, 9, 10, 0.0), band(1, 1, 100, 50.0), band(2, 3, 50, 25.0)];
        assert!(validate_bands(&bands).is_ok());
    }

    #[test]
    fn test_empty_structure_is_allowed() {
        assert!(validate_bands(&[]).is_ok());
    }

    #[test]
    fn test_overlap_rejected() {
        let bands = vec![band(1, 3, 100, 0.0), band(3, 5, 50, 0.0)];
        let err = validate_bands(&bands).unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_gap_rejected() {
        let bands = vec![band(1, 1, 100, 0.0), band(3, 5, 50, 0.0)];
        let err = validate_bands(&bands).unwrap_err();
        assert!(err.to_string().contains("no band covers place 2"));
    }

    #[test]
    fn test_last_place_at_integer_limit_rejected() {
        let err = validate_bands(&[band(1, i32::MAX, 10, 0.0)]).unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_must_start_at_first_place() {
        let err = validate_bands(&[band(2, 4, 10, 0.0)]).unwrap_err();
        assert!(err.to_string().contains("place 1"));
    }

    #[test]
    fn test_inverted_range_and_bad_values_rejected() {
        assert!(validate_bands(&[band(3, 1, 10, 0.0)]).is_err());
        assert!(validate_bands(&[band(1, 1, -5, 0.0)]).is_err());
        assert!(validate_bands(&[band(1, 1, 5, 120.0)]).is_err());
        assert!(validate_bands(&[band(1, 1, 5, 60.0), band(2, 2, 5, 60.0)]).is_err());
    }

    #[test]
    fn test_unmatched_place_resolves_to_zero() {
        let now = chrono::Utc::now();
        let rows = vec![PointBandRow {
            id: Uuid::new_v4(),
            tournament_id: Uuid::new_v4(),
            place_from: 1,
            place_to: 3,
            points: 40,
            prize_percentage: 30.0,
            created_at: now,
        }];

        assert_eq!(resolve_place(&rows, 2).points, 40);
        assert_eq!(resolve_place(&rows, 4), PlacePoints::NONE);
    }
}
