use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::info;
use uuid::Uuid;

use infra::ledger::SeatPlacement;
use infra::models::SeatAssignmentRow;
use infra::LedgerStore;

use crate::error::{LifecycleError, LifecycleResult};

/// Seat layout of the room.
#[derive(Debug, Clone, Copy)]
pub struct SeatLayout {
    pub seats_per_table: i32,
    pub max_tables: i32,
}

impl SeatLayout {
    pub fn capacity(&self) -> usize {
        (self.seats_per_table as usize) * (self.max_tables as usize)
    }

    /// Row-major coordinates of the `index`th seat, 0-based.
    pub fn seat_at(&self, index: usize) -> (i32, i32) {
        let per_table = self.seats_per_table as usize;
        ((index / per_table) as i32 + 1, (index % per_table) as i32 + 1)
    }

    pub fn contains(&self, table_number: i32, seat_number: i32) -> bool {
        (1..=self.max_tables).contains(&table_number)
            && (1..=self.seats_per_table).contains(&seat_number)
    }

    /// First (table, seat) not in `occupied`, scanning row-major.
    pub fn first_free(&self, occupied: &HashSet<(i32, i32)>) -> Option<(i32, i32)> {
        (1..=self.max_tables)
            .flat_map(|table| (1..=self.seats_per_table).map(move |seat| (table, seat)))
            .find(|pair| !occupied.contains(pair))
    }

    /// Seat `players` in order: player `i` goes to table `i / n + 1`, seat
    /// `i % n + 1`.
    pub fn initial_seats(&self, players: &[Uuid]) -> LifecycleResult<Vec<SeatPlacement>> {
        if players.len() > self.capacity() {
            return Err(LifecycleError::CapacityExceeded(format!(
                "{} players exceed {} seats",
                players.len(),
                self.capacity()
            )));
        }

        Ok(players
            .iter()
            .enumerate()
            .map(|(i, user_id)| {
                let (table_number, seat_number) = self.seat_at(i);
                SeatPlacement {
                    user_id: *user_id,
                    table_number,
                    seat_number,
                }
            })
            .collect())
    }
}

/// Uniformly shuffle the players before they are seated.
pub fn shuffle_players(players: &mut [Uuid]) {
    players.shuffle(&mut rand::rng());
}

#[derive(Clone)]
pub struct SeatingEngine {
    ledger: Arc<dyn LedgerStore>,
    layout: SeatLayout,
}

impl SeatingEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, layout: SeatLayout) -> Self {
        Self { ledger, layout }
    }

    pub fn layout(&self) -> SeatLayout {
        self.layout
    }

    /// Seat one player at the first free seat.
    ///
    /// Idempotent: a player who already has a seat gets it back unchanged, so
    /// re-running this after a partial failure is the reconciliation path.
    pub async fn assign_seat_to_player(
        &self,
        tournament_id: Uuid,
        user_id: Uuid,
    ) -> LifecycleResult<SeatAssignmentRow> {
        if let Some(existing) = self
            .ledger
            .get_seat_assignment(tournament_id, user_id)
            .await?
        {
            return Ok(existing);
        }

        let occupied: HashSet<(i32, i32)> = self
            .ledger
            .list_seat_assignments(tournament_id)
            .await?
            .into_iter()
            .map(|s| (s.table_number, s.seat_number))
            .collect();

        let (table_number, seat_number) = self.layout.first_free(&occupied).ok_or_else(|| {
            LifecycleError::CapacityExceeded(format!(
                "all {} seats taken in tournament {}",
                self.layout.capacity(),
                tournament_id
            ))
        })?;

        let row = self
            .ledger
            .upsert_seat_assignment(
                tournament_id,
                &SeatPlacement {
                    user_id,
                    table_number,
                    seat_number,
                },
            )
            .await?;

        info!(
            "Seated player {} at table {} seat {} in tournament {}",
            user_id, table_number, seat_number, tournament_id
        );
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: SeatLayout = SeatLayout {
        seats_per_table: 9,
        max_tables: 20,
    };

    #[test]
    fn test_seat_math_wraps_every_nine() {
        assert_eq!(LAYOUT.seat_at(0), (1, 1));
        assert_eq!(LAYOUT.seat_at(8), (1, 9));
        assert_eq!(LAYOUT.seat_at(9), (2, 1));
        assert_eq!(LAYOUT.seat_at(179), (20, 9));
    }

    #[test]
    fn test_initial_seats_rejects_overflow() {
        let players: Vec<Uuid> = (0..181).map(|_| Uuid::new_v4()).collect();
        let err = LAYOUT.initial_seats(&players).unwrap_err();
        assert!(matches!(err, LifecycleError::CapacityExceeded(_)));

        assert_eq!(LAYOUT.initial_seats(&players[..180]).unwrap().len(), 180);
    }

    #[test]
    fn test_first_free_skips_occupied() {
        let occupied: HashSet<(i32, i32)> = [(1, 1), (1, 2), (1, 4)].into_iter().collect();
        assert_eq!(LAYOUT.first_free(&occupied), Some((1, 3)));

        let full: HashSet<(i32, i32)> = (0..LAYOUT.capacity()).map(|i| LAYOUT.seat_at(i)).collect();
        assert_eq!(LAYOUT.first_free(&full), None);
    }

    #[test]
    fn test_shuffle_keeps_every_player() {
        let mut players: Vec<Uuid> = (0..30).map(|_| Uuid::new_v4()).collect();
        let original: HashSet<Uuid> = players.iter().copied().collect();
        shuffle_players(&mut players);
        assert_eq!(players.iter().copied().collect::<HashSet<_>>(), original);
    }
}
