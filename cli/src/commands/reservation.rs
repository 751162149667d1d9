// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reservation and session commands
//!
//! Commands: create, start, end, cancel, join, show, code, today, active,
//! customer, availability

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::bootstrap::RoomsRuntime;
use rooms_core::application::ReservationService;
use rooms_core::domain::reservation::{
    CustomerId, Reservation, ReservationId, ReservationRequest, ReservationStatus,
};
use rooms_core::domain::room::RoomId;

#[derive(Subcommand)]
pub enum ReservationCommand {
    /// Book a room
    Create {
        #[arg(long, value_name = "ROOM_ID")]
        room: Uuid,

        #[arg(long, value_name = "CUSTOMER_ID")]
        customer: Uuid,

        /// Customer display name
        #[arg(long)]
        name: Option<String>,

        /// Scheduled start as RFC 3339 (default: now)
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<DateTime<Utc>>,

        #[arg(long)]
        notes: Option<String>,

        /// Issue an access code so others can join
        #[arg(long)]
        shared: bool,
    },

    /// Check the customer in and occupy the room
    Start {
        #[arg(value_name = "RESERVATION_ID")]
        reservation_id: Uuid,
    },

    /// Check out, compute the bill and free the room
    End {
        #[arg(value_name = "RESERVATION_ID")]
        reservation_id: Uuid,
    },

    /// Cancel a booking before check-in
    Cancel {
        #[arg(value_name = "RESERVATION_ID")]
        reservation_id: Uuid,
    },

    /// Join a shared session by access code
    Join {
        #[arg(long, value_name = "CODE")]
        code: String,

        #[arg(long, value_name = "CUSTOMER_ID")]
        customer: Uuid,

        #[arg(long)]
        name: String,
    },

    /// Show one reservation
    Show {
        #[arg(value_name = "RESERVATION_ID")]
        reservation_id: Uuid,
    },

    /// Look up an open reservation by access code
    Code {
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Today's reservations for a room
    Today {
        #[arg(long, value_name = "ROOM_ID")]
        room: Uuid,
    },

    /// Sessions currently in progress
    Active,

    /// Open reservations a customer owns or belongs to
    Customer {
        #[arg(value_name = "CUSTOMER_ID")]
        customer_id: Uuid,
    },

    /// Check whether a start time is free for a room
    Availability {
        #[arg(long, value_name = "ROOM_ID")]
        room: Uuid,

        /// Scheduled start as RFC 3339
        #[arg(long, value_name = "TIMESTAMP")]
        at: DateTime<Utc>,
    },
}

pub async fn handle_command(
    command: ReservationCommand,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let runtime = RoomsRuntime::init(config_path).await?;
    runtime.warn_if_ephemeral();
    let service = runtime.service.as_ref();

    match command {
        ReservationCommand::Create {
            room,
            customer,
            name,
            at,
            notes,
            shared,
        } => {
            let scheduled_start = at.unwrap_or_else(Utc::now);
            let mut request =
                ReservationRequest::new(RoomId(room), CustomerId(customer), scheduled_start);
            if let Some(name) = name {
                request = request.with_customer_name(name);
            }
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            if shared {
                request = request.shared();
            }

            let reservation = service
                .create_reservation(request)
                .await
                .context("Failed to create reservation")?;
            println!("{}", format!("✓ Reservation created: {}", reservation.id).green());
            if let Some(code) = reservation.access_code() {
                println!("  Access code: {}", code.bold());
            }
        }
        ReservationCommand::Start { reservation_id } => {
            let reservation = service
                .start_session(ReservationId(reservation_id))
                .await
                .context("Failed to start session")?;
            println!("{}", format!("✓ Session started: {}", reservation.id).green());
        }
        ReservationCommand::End { reservation_id } => {
            let reservation = service
                .end_session(ReservationId(reservation_id))
                .await
                .context("Failed to end session")?;
            println!("{}", format!("✓ Session completed: {}", reservation.id).green());
            if let Some(minutes) = reservation.duration_minutes() {
                println!("  Duration: {} min", minutes);
            }
            if let Some(cost) = reservation.total_cost() {
                println!("  Total: {}", cost.to_string().bold());
            }
        }
        ReservationCommand::Cancel { reservation_id } => {
            service
                .cancel_reservation(ReservationId(reservation_id))
                .await
                .context("Failed to cancel reservation")?;
            println!("{}", format!("✓ Reservation {} cancelled", reservation_id).green());
        }
        ReservationCommand::Join { code, customer, name } => {
            let reservation = service
                .join_by_access_code(&code, CustomerId(customer), name)
                .await
                .context("Failed to join session")?;
            println!(
                "{}",
                format!(
                    "✓ Joined reservation {} ({} members)",
                    reservation.id,
                    reservation.members().len()
                )
                .green()
            );
        }
        ReservationCommand::Show { reservation_id } => {
            let reservation = service.get_reservation(ReservationId(reservation_id)).await?;
            print_details(&reservation);
        }
        ReservationCommand::Code { code } => {
            let reservation = service.get_by_access_code(&code).await?;
            print_details(&reservation);
        }
        ReservationCommand::Today { room } => {
            print_table(&service.get_today_for_room(RoomId(room)).await?);
        }
        ReservationCommand::Active => {
            print_table(&service.get_active_sessions().await?);
        }
        ReservationCommand::Customer { customer_id } => {
            print_table(&service.get_active_for_customer(CustomerId(customer_id)).await?);
        }
        ReservationCommand::Availability { room, at } => {
            if service.check_availability(RoomId(room), at).await? {
                println!("{}", format!("✓ Room is free at {}", at).green());
            } else {
                println!("{}", format!("✗ Room is already booked near {}", at).red());
            }
        }
    }

    Ok(())
}

fn print_table(reservations: &[Reservation]) {
    if reservations.is_empty() {
        println!("{}", "No reservations found".yellow());
        return;
    }

    println!("{} reservations found:", reservations.len());
    println!(
        "{:<38} {:<38} {:<22} {}",
        "ID", "ROOM", "SCHEDULED", "STATUS"
    );
    for reservation in reservations {
        println!(
            "{:<38} {:<38} {:<22} {}",
            reservation.id,
            reservation.room_id,
            reservation.scheduled_start.format("%Y-%m-%d %H:%M UTC"),
            colored_status(reservation.status())
        );
    }
}

fn print_details(reservation: &Reservation) {
    println!("{}", format!("Reservation {}", reservation.id).bold());
    println!("  Room: {}", reservation.room_id);
    println!("  Status: {}", colored_status(reservation.status()));
    println!("  Scheduled: {}", reservation.scheduled_start);
    println!("  Rate: {}/hour", reservation.hourly_rate());
    if let Some(name) = &reservation.customer_name {
        println!("  Customer: {}", name);
    }
    if let Some(started) = reservation.actual_start_time() {
        println!("  Started: {}", started);
    }
    if let Some(ended) = reservation.end_time() {
        println!("  Ended: {}", ended);
    }
    if let Some(cost) = reservation.total_cost() {
        println!("  Total: {}", cost);
    }
    if let Some(reason) = reservation.cancellation_reason() {
        println!("  Cancelled: {}", reason.as_str());
    }
    if let Some(code) = reservation.access_code() {
        println!("  Access code: {}", code);
    }
    if !reservation.notes.is_empty() {
        println!("  Notes: {}", reservation.notes.dimmed());
    }
    if !reservation.members().is_empty() {
        println!("  Members:");
        for member in reservation.members() {
            println!(
                "    - {} ({}, {})",
                member.customer_name,
                member.role.as_str(),
                member.customer_id
            );
        }
    }
}

fn colored_status(status: ReservationStatus) -> colored::ColoredString {
    match status {
        ReservationStatus::Reserved => status.as_str().cyan(),
        ReservationStatus::Active => status.as_str().green(),
        ReservationStatus::Cancelled => status.as_str().red(),
        ReservationStatus::Completed => status.as_str().dimmed(),
    }
}
