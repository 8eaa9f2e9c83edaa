// Seat-booking rules shared by every store. The seat-taken check duplicates the
// `unique_seat_per_session` index only to produce a field error.

use chrono::{DateTime, Utc};

use crate::error::{AppResult, FieldErrors, SEAT_TAKEN};
use crate::models::{PlanetariumDome, TicketRequest};

pub const PAST_SESSION: &str = "Cannot book a ticket for a past session.";
pub const EMPTY_TICKETS: &str = "This list may not be empty.";

pub fn validate_dome_dimensions(rows: i32, seats_in_row: i32) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if rows < 1 {
        errors.add("rows", "Number of rows must be at least 1");
    }
    if seats_in_row < 1 {
        errors.add("seats_in_row", "Number of seats must be at least 1");
    }
    errors.into_result()
}

/// Checks `1 <= row <= dome.rows` and `1 <= seat <= dome.seats_in_row` independently.
pub fn check_ticket_placement(row: i32, seat: i32, dome: &PlanetariumDome) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (value, name, dome_attr, limit) in [
        (row, "row", "rows", dome.rows),
        (seat, "seat", "seats_in_row", dome.seats_in_row),
    ] {
        if !(1..=limit).contains(&value) {
            errors.add(
                name,
                format!("{name} number must be in available range: (1, {dome_attr}): (1, {limit})"),
            );
        }
    }
    errors
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSlot<'a> {
    pub show_time: DateTime<Utc>,
    pub dome: &'a PlanetariumDome,
}

/// Runs the full pre-save validation pass for one ticket.
///
/// `is_taken` is asked only once the coordinates are known to be inside the dome,
/// and must answer for tickets already written in the current unit of work too.
pub fn check_ticket<F>(
    request: &TicketRequest,
    slot: SessionSlot<'_>,
    now: DateTime<Utc>,
    is_taken: F,
) -> FieldErrors
where
    F: FnOnce(i32, i32) -> bool,
{
    let mut errors = FieldErrors::new();
    if slot.show_time < now {
        errors.add("show_session", PAST_SESSION);
    }

    let placement = check_ticket_placement(request.row, request.seat, slot.dome);
    if placement.is_empty() {
        if is_taken(request.row, request.seat) {
            errors.add("seat", SEAT_TAKEN);
        }
    } else {
        errors.extend(placement);
    }
    errors
}

pub fn validate_ticket_list(tickets: &[TicketRequest]) -> AppResult<()> {
    if tickets.is_empty() {
        return FieldErrors::single("tickets", EMPTY_TICKETS).into_result();
    }
    Ok(())
}

// Indices sorted by (show_session, row, seat). Every writer takes seat locks in
// this order; equal triples keep request order.
pub fn insertion_order(tickets: &[TicketRequest]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..tickets.len()).collect();
    order.sort_by_key(|&i| (tickets[i].show_session, tickets[i].row, tickets[i].seat));
    order
}

pub fn missing_reference(id: i64) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}
