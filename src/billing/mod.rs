//! Server-side invoice pricing.
//!
//! Line amounts are always computed here from stored room and amenity pricing
//! plus the submitted meter readings and occupant count. Client-supplied
//! amounts are never trusted.

use std::collections::HashMap;

use crate::models::{Amenity, FeeMode, InvoiceLine, MeterReading, Room, RoomAmenityLink};

/// Compute all line items for a room's monthly invoice.
///
/// `links` carries the enabled amenity links of the room paired with their
/// amenities; disabled links must be filtered out by the caller's query.
/// A metered amenity without a submitted reading bills zero consumption.
pub fn compute_line_items(
    room: &Room,
    links: &[(Amenity, RoomAmenityLink)],
    readings: &[MeterReading],
    occupant_count: i64,
) -> Vec<InvoiceLine> {
    let readings: HashMap<&str, i64> = readings
        .iter()
        .map(|r| (r.amenity_id.as_str(), r.current))
        .collect();

    let mut lines = Vec::with_capacity(links.len() + 1);

    lines.push(InvoiceLine {
        description: format!("Tiền phòng {}", room.code),
        amenity_id: None,
        unit_price: room.price,
        quantity: 1,
        amount: room.price,
    });

    for (amenity, link) in links {
        let quantity = match amenity.fee_mode {
            FeeMode::Metered => {
                let current = readings.get(amenity.id.as_str()).copied();
                current
                    .map(|c| (c - link.last_used_number).max(0))
                    .unwrap_or(0)
            }
            FeeMode::PerPerson => occupant_count.max(0),
            FeeMode::Fixed => 1,
        };

        lines.push(InvoiceLine {
            description: amenity.name.clone(),
            amenity_id: Some(amenity.id.clone()),
            unit_price: amenity.unit_price,
            quantity,
            amount: amenity.unit_price * quantity,
        });
    }

    lines
}

/// Invoice total: the sum of all line amounts.
pub fn total(lines: &[InvoiceLine]) -> i64 {
    lines.iter().map(|line| line.amount).sum()
}

/// Format an amount as Vietnamese currency with dot grouping: "2.115.000 ₫".
pub fn format_vnd(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{} ₫", grouped)
    } else {
        format!("{} ₫", grouped)
    }
}
