// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Room administration commands
//!
//! Commands: add, list, rate, maintenance

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

use crate::bootstrap::RoomsRuntime;
use rooms_core::application::ReservationService;
use rooms_core::domain::room::{LocalizedText, Room, RoomId, RoomStatus};

#[derive(Subcommand)]
pub enum RoomCommand {
    /// Register a bookable room
    Add {
        /// Room name in the default locale
        #[arg(long)]
        name: String,

        /// Price per hour
        #[arg(long, value_name = "AMOUNT")]
        rate: Decimal,

        /// Room description in the default locale
        #[arg(long, default_value = "")]
        description: String,

        /// Translated name as LOCALE=TEXT (repeatable)
        #[arg(long = "translation", value_name = "LOCALE=TEXT", value_parser = parse_translation)]
        translations: Vec<(String, String)>,
    },

    /// List rooms in this branch
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Change the hourly rate for future bookings
    Rate {
        #[arg(value_name = "ROOM_ID")]
        room_id: Uuid,

        #[arg(value_name = "AMOUNT")]
        rate: Decimal,
    },

    /// Take a room out of service, or return it with --done
    Maintenance {
        #[arg(value_name = "ROOM_ID")]
        room_id: Uuid,

        /// Finish maintenance and make the room available
        #[arg(long)]
        done: bool,
    },
}

pub async fn handle_command(command: RoomCommand, config_path: Option<PathBuf>) -> Result<()> {
    let runtime = RoomsRuntime::init(config_path).await?;
    runtime.warn_if_ephemeral();
    let service = runtime.service.as_ref();

    match command {
        RoomCommand::Add {
            name,
            rate,
            description,
            translations,
        } => {
            let name = translations
                .into_iter()
                .fold(LocalizedText::new(name), |text, (locale, value)| {
                    text.with_translation(locale, value)
                });
            let room = service
                .register_room(name, LocalizedText::new(description), rate)
                .await
                .context("Failed to register room")?;
            println!(
                "{}",
                format!("✓ Room registered: {} ({})", room.display_name(), room.id).green()
            );
            Ok(())
        }
        RoomCommand::List { json } => {
            let rooms = service.list_rooms().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rooms)?);
            } else {
                print_rooms(&rooms);
            }
            Ok(())
        }
        RoomCommand::Rate { room_id, rate } => {
            let room = service
                .change_room_rate(RoomId(room_id), rate)
                .await
                .context("Failed to change room rate")?;
            println!(
                "{}",
                format!("✓ {} now costs {}/hour", room.display_name(), room.hourly_rate()).green()
            );
            Ok(())
        }
        RoomCommand::Maintenance { room_id, done } => {
            let room = service
                .set_room_maintenance(RoomId(room_id), !done)
                .await
                .context("Failed to update room maintenance")?;
            println!(
                "{}",
                format!("✓ {} is {}", room.display_name(), room.status()).green()
            );
            Ok(())
        }
    }
}

fn print_rooms(rooms: &[Room]) {
    if rooms.is_empty() {
        println!("{}", "No rooms found".yellow());
        return;
    }

    println!("{} rooms found:", rooms.len());
    println!("{:<38} {:<24} {:<10} {}", "ID", "NAME", "RATE", "STATUS");
    for room in rooms {
        let status = match room.status() {
            RoomStatus::Available => room.status().to_string().green(),
            RoomStatus::Occupied => room.status().to_string().yellow(),
            RoomStatus::Maintenance => room.status().to_string().red(),
        };
        println!(
            "{:<38} {:<24} {:<10} {}",
            room.id,
            room.display_name().bold(),
            room.hourly_rate(),
            status
        );
    }
}

fn parse_translation(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((locale, text)) if !locale.trim().is_empty() && !text.trim().is_empty() => {
            Ok((locale.trim().to_string(), text.trim().to_string()))
        }
        _ => Err(format!("expected LOCALE=TEXT, got '{}'", raw)),
    }
}
