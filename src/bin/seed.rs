use chrono::{Duration, Utc};
use clap::Parser;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;

use junket::{
    domain::{NewBatch, NewOrganizer, NewTrip, NewUser, TripStatus},
    repository::{
        OrganizerRepository, SqliteOrganizerRepository, SqliteTripRepository,
        SqliteUserRepository, TripRepository, UserRepository,
    },
};

#[derive(Parser)]
#[command(about = "Seed the junket database with demo data")]
struct Args {
    /// Database URL (falls back to DATABASE_URL, then sqlite:junket.db)
    #[arg(long)]
    database_url: Option<String>,

    /// Number of organizers to create
    #[arg(long, default_value_t = 3)]
    organizers: usize,

    /// Number of travelers to create
    #[arg(long, default_value_t = 10)]
    travelers: usize,

    /// Number of trips per organizer
    #[arg(long, default_value_t = 2)]
    trips: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:junket.db".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let organizer_repo = SqliteOrganizerRepository::new(db_pool.clone());
    let trip_repo = SqliteTripRepository::new(db_pool.clone());
    let user_repo = SqliteUserRepository::new(db_pool.clone());

    println!("🧑‍💼 Creating {} organizers...", args.organizers);
    let mut organizers = Vec::new();
    for i in 0..args.organizers {
        let organizer = organizer_repo
            .create(NewOrganizer {
                name: Name().fake(),
                email: SafeEmail().fake(),
                // First organizer keeps the platform default rate
                commission_rate: if i == 0 { None } else { Some(Decimal::from(8 + i as i64)) },
            })
            .await?;
        organizer_repo
            .create_lead(organizer.id, Name().fake::<String>().as_str(), SafeEmail().fake::<String>().as_str())
            .await?;
        organizers.push(organizer);
    }

    println!("🧳 Creating {} travelers...", args.travelers);
    for _ in 0..args.travelers {
        user_repo
            .create(NewUser {
                name: Name().fake(),
                email: SafeEmail().fake(),
            })
            .await?;
    }

    println!("🗺️  Creating trips with departure batches...");
    let destinations = [
        "Ladakh Circuit",
        "Spiti Valley Expedition",
        "Meghalaya Caves & Falls",
        "Kerala Backwaters",
        "Rann of Kutch",
        "Andaman Island Hop",
    ];
    let now = Utc::now();
    let mut trip_count = 0;
    for (i, organizer) in organizers.iter().enumerate() {
        for j in 0..args.trips {
            let title = destinations[(i * args.trips + j) % destinations.len()].to_string();
            trip_repo
                .create(NewTrip {
                    organizer_id: organizer.id,
                    title,
                    price: Decimal::from(15000 + (1000 * (i + j)) as i64),
                    status: TripStatus::Published,
                    balance_due_days: 30,
                    commission_rate_override: None,
                    batches: vec![
                        NewBatch {
                            id: "b1".to_string(),
                            start_date: now + Duration::days(20),
                            end_date: now + Duration::days(27),
                            capacity: 12,
                            deal_price: None,
                        },
                        NewBatch {
                            id: "b2".to_string(),
                            start_date: now + Duration::days(50),
                            end_date: now + Duration::days(57),
                            capacity: 16,
                            deal_price: Some(Decimal::from(13500)),
                        },
                        // Concluded departure so settlements have data
                        NewBatch {
                            id: "b0".to_string(),
                            start_date: now - Duration::days(30),
                            end_date: now - Duration::days(23),
                            capacity: 10,
                            deal_price: None,
                        },
                    ],
                })
                .await?;
            trip_count += 1;
        }
    }

    println!("✅ Seeded {} organizers, {} travelers, {} trips", organizers.len(), args.travelers, trip_count);
    Ok(())
}
