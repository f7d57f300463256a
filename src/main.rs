mod analytics;
mod db;
mod models;
mod tui;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use db::{ApplicationUpdate, Database, NewApplication};
use models::{Application, Status, User};
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "apptrack")]
#[command(about = "Track job applications and see how your pipeline is going")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage tracked users (profiles)
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Add a job application
    Add {
        /// Company name
        company: String,

        /// Position title
        position: String,

        /// Date applied (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Status (applied, phone_screen, technical, final_round, offer, rejected)
        #[arg(short, long, default_value = "applied")]
        status: String,

        /// Link to the posting
        #[arg(short, long)]
        link: Option<String>,

        /// Location
        #[arg(long)]
        location: Option<String>,

        /// Notes or job description
        #[arg(long)]
        description: Option<String>,

        /// Lower end of the salary range
        #[arg(long)]
        salary_min: Option<i64>,

        /// Upper end of the salary range
        #[arg(long)]
        salary_max: Option<i64>,
    },

    /// List applications
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Sort column (company, position, status, applied_date, salary_min, salary_max, created_at)
        #[arg(long, default_value = "applied_date")]
        sort: String,

        /// Sort ascending instead of newest first
        #[arg(long)]
        asc: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show application details
    Show {
        /// Application ID
        id: i64,
    },

    /// Edit an application (any field, independently)
    Edit {
        /// Application ID
        id: i64,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        position: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// Date applied (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// First response date (YYYY-MM-DD, or 'none' to clear)
        #[arg(long)]
        response_date: Option<String>,

        /// First interview date (YYYY-MM-DD, or 'none' to clear)
        #[arg(long)]
        interview_date: Option<String>,

        /// Offer date (YYYY-MM-DD, or 'none' to clear)
        #[arg(long)]
        offer_date: Option<String>,

        /// Rejection date (YYYY-MM-DD, or 'none' to clear)
        #[arg(long)]
        rejection_date: Option<String>,

        #[arg(long)]
        link: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        salary_min: Option<i64>,

        #[arg(long)]
        salary_max: Option<i64>,
    },

    /// Delete an application
    Delete {
        /// Application ID
        id: i64,
    },

    /// Print pipeline analytics (funnel, statuses, weekly volume, salaries)
    Stats,

    /// Interactive analytics dashboard
    Dashboard,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a user (the first one becomes active)
    Add {
        /// User name
        name: String,
    },

    /// List users
    List,

    /// Switch the active user
    Switch {
        /// User name
        name: String,
    },

    /// Show the active user
    Current,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let db = Database::open()?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::User { command } => {
            db.ensure_initialized()?;
            match command {
                UserCommands::Add { name } => {
                    let id = db.get_or_create_user(&name)?;
                    println!("Added user '{}' (ID: {})", name, id);
                }
                UserCommands::List => {
                    let users = db.list_users()?;
                    let active = db.active_user()?.map(|u| u.id);
                    if users.is_empty() {
                        println!("No users yet.");
                    } else {
                        for user in users {
                            let marker = if Some(user.id) == active { "*" } else { " " };
                            println!("{} {:<4} {}", marker, user.id, user.name);
                        }
                    }
                }
                UserCommands::Switch { name } => {
                    let user = db.set_active_user(&name)?;
                    println!("Active user is now '{}'.", user.name);
                }
                UserCommands::Current => match db.active_user()? {
                    Some(user) => println!("{}", user.name),
                    None => println!("No active user. Run 'apptrack user add <name>'."),
                },
            }
        }

        Commands::Add {
            company,
            position,
            date,
            status,
            link,
            location,
            description,
            salary_min,
            salary_max,
        } => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;

            let applied_date = match date {
                Some(d) => parse_date(&d)?,
                None => chrono::Local::now().date_naive(),
            };
            check_salary(salary_min)?;
            check_salary(salary_max)?;

            let new = NewApplication {
                company: company.clone(),
                position: position.clone(),
                status: Some(Status::from_str(&status)?),
                applied_date,
                link,
                location,
                description,
                salary_min,
                salary_max,
            };
            let id = db.add_application(user.id, &new)?;
            println!("Added application #{}: {} at {}", id, position, company);
        }

        Commands::List {
            status,
            sort,
            asc,
            json,
        } => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;
            let status = status.as_deref().map(Status::from_str).transpose()?;
            let apps = db.list_applications(user.id, status, &sort, !asc)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
            } else if apps.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<6} {:<20} {:<26} {:<12} {:<12} {:>12}",
                    "ID", "COMPANY", "POSITION", "STATUS", "APPLIED", "SALARY"
                );
                println!("{}", "-".repeat(92));
                for app in &apps {
                    println!(
                        "{:<6} {:<20} {:<26} {:<12} {:<12} {:>12}",
                        app.id,
                        truncate(&app.company, 18),
                        truncate(&app.position, 24),
                        app.status_or_default().as_str(),
                        app.applied_date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        format_salary_range(app),
                    );
                }
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;
            match db.get_application(user.id, id)? {
                Some(app) => print_application(&app),
                None => println!("Application #{} not found.", id),
            }
        }

        Commands::Edit {
            id,
            company,
            position,
            status,
            date,
            response_date,
            interview_date,
            offer_date,
            rejection_date,
            link,
            location,
            description,
            salary_min,
            salary_max,
        } => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;
            check_salary(salary_min)?;
            check_salary(salary_max)?;

            let update = ApplicationUpdate {
                company,
                position,
                status: status.as_deref().map(Status::from_str).transpose()?,
                applied_date: date.as_deref().map(parse_date).transpose()?,
                response_date: response_date.as_deref().map(parse_date_or_none).transpose()?,
                first_interview_date: interview_date
                    .as_deref()
                    .map(parse_date_or_none)
                    .transpose()?,
                offer_date: offer_date.as_deref().map(parse_date_or_none).transpose()?,
                rejection_date: rejection_date
                    .as_deref()
                    .map(parse_date_or_none)
                    .transpose()?,
                link,
                location,
                description,
                salary_min,
                salary_max,
            };

            if db.update_application(user.id, id, &update)? {
                println!("Updated application #{}.", id);
            } else {
                println!("Application #{} not found.", id);
            }
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;
            if db.delete_application(user.id, id)? {
                println!("Deleted application #{}.", id);
            } else {
                println!("Application #{} not found.", id);
            }
        }

        Commands::Stats => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;
            let apps = db.list_applications(user.id, None, "applied_date", true)?;
            if apps.is_empty() {
                println!("No applications yet.");
            } else {
                print_stats(&apps);
            }
        }

        Commands::Dashboard => {
            db.ensure_initialized()?;
            let user = require_active_user(&db)?;
            tui::run_dashboard(&db, &user)?;
        }
    }

    Ok(())
}

fn require_active_user(db: &Database) -> Result<User> {
    db.active_user()?
        .ok_or_else(|| anyhow!("No active user. Run 'apptrack user add <name>' first."))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (expected YYYY-MM-DD)", s))
}

/// 'none' clears the field; anything else must be a date.
fn parse_date_or_none(s: &str) -> Result<Option<NaiveDate>> {
    if s.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse_date(s).map(Some)
    }
}

fn check_salary(value: Option<i64>) -> Result<()> {
    if let Some(v) = value {
        if v < 0 {
            return Err(anyhow!("Salary must be non-negative, got {}", v));
        }
    }
    Ok(())
}

fn format_salary_range(app: &Application) -> String {
    match (app.salary_min, app.salary_max) {
        (Some(min), Some(max)) => format!("${}k-${}k", min / 1000, max / 1000),
        (Some(min), None) => format!("${}k+", min / 1000),
        (None, Some(max)) => format!("<${}k", max / 1000),
        (None, None) => "-".to_string(),
    }
}

fn print_application(app: &Application) {
    println!("Application #{}", app.id);
    println!("Company: {}", app.company);
    println!("Position: {}", app.position);
    println!("Status: {}", app.status_or_default().as_str());
    if let Some(d) = app.applied_date {
        println!("Applied: {}", d);
    }
    if let Some(d) = app.response_date {
        println!("First response: {}", d);
    }
    if let Some(d) = app.first_interview_date {
        println!("First interview: {}", d);
    }
    if let Some(d) = app.offer_date {
        println!("Offer: {}", d);
    }
    if let Some(d) = app.rejection_date {
        println!("Rejected: {}", d);
    }
    if let Some(link) = &app.link {
        println!("Link: {}", link);
    }
    if let Some(location) = &app.location {
        println!("Location: {}", location);
    }
    match (app.salary_min, app.salary_max) {
        (Some(min), Some(max)) => println!("Salary: ${} - ${}", min, max),
        (Some(min), None) => println!("Salary: ${}+", min),
        (None, Some(max)) => println!("Salary: up to ${}", max),
        (None, None) => {}
    }
    println!("Created: {}", app.created_at);
    if let Some(desc) = &app.description {
        println!("\n--- Description ---");
        println!("{}", textwrap::fill(desc, 78));
    }
}

fn print_stats(apps: &[Application]) {
    let funnel = analytics::compute_funnel(apps);
    println!("Application Funnel");
    println!(
        "  {}% interview rate | {} rejected",
        funnel.interview_rate, funnel.rejected_count
    );
    let max = funnel.stages.iter().map(|s| s.count).max().unwrap_or(0);
    for stage in &funnel.stages {
        println!(
            "  {:<14} {:>4} {}",
            stage.label,
            stage.count,
            bar(stage.count, max, 40)
        );
    }

    println!("\nStatus Breakdown");
    for slice in analytics::compute_status_distribution(apps) {
        println!("  {:<14} {:>4}", slice.label, slice.count);
    }

    let weekly = analytics::compute_weekly_volume(apps);
    println!("\nApplications Over Time (last {} weeks with data)", weekly.len());
    let max = weekly.iter().map(|w| w.count).max().unwrap_or(0);
    for bucket in &weekly {
        println!(
            "  week of {} {:>4} {}",
            bucket.week_start,
            bucket.count,
            bar(bucket.count, max, 40)
        );
    }

    let hist = analytics::compute_salary_histogram(apps);
    if hist.bins.is_empty() {
        println!("\nSalary Distribution: no salary data");
    } else {
        println!(
            "\nSalary Distribution (avg ${}k)",
            (hist.average / 1000.0).round() as i64
        );
        let max = hist.bins.iter().map(|b| b.count).max().unwrap_or(0);
        for bin in &hist.bins {
            println!(
                "  {:<12} {:>4} {}",
                bin.range_label,
                bin.count,
                bar(bin.count, max, 40)
            );
        }
    }
}

fn bar(count: usize, max: usize, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    "#".repeat(count * width / max)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_char_boundary_safe() {
        assert_eq!(truncate("Acme", 18), "Acme");
        assert_eq!(truncate("A Very Long Company Name", 10), "A Very ...");
        // multi-byte names must not split inside a code point
        assert_eq!(truncate("Müller Büromöbel GmbH", 10), "Müller ...");
        assert_eq!(truncate("日本電気株式会社", 5), "日本...");
    }

    #[test]
    fn date_or_none_clears_or_parses() {
        assert_eq!(parse_date_or_none("none").unwrap(), None);
        assert_eq!(
            parse_date_or_none("2024-03-01").unwrap(),
            Some("2024-03-01".parse().unwrap())
        );
        assert!(parse_date_or_none("03/01/2024").is_err());
    }
}
