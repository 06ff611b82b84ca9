use chrono::{Duration, Utc};
use clap::Parser;
use fake::faker::company::en::{Buzzword, CatchPhrase};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use matricula::{
    domain::{Booking, BookingStatus, Course, CourseSession, TimeBlock},
    repository::{
        BookingRepository, CourseRepository, SqliteBookingRepository, SqliteCourseRepository,
    },
};

#[derive(Parser)]
#[command(about = "Seed a development database with courses and bookings")]
struct Args {
    /// Number of courses to generate
    #[arg(long, default_value_t = 5)]
    courses: usize,

    /// Sessions per course
    #[arg(long, default_value_t = 3)]
    sessions: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:matricula.db".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let course_repo = SqliteCourseRepository::new(db_pool.clone());
    let booking_repo = SqliteBookingRepository::new(db_pool.clone());

    println!("📚 Creating {} courses...", args.courses);
    let mut course_ids = Vec::new();
    for i in 0..args.courses {
        let sessions = (0..args.sessions)
            .map(|s| {
                let start = Utc::now() + Duration::days((7 * (s + 1)) as i64);
                CourseSession {
                    session_id: format!("s{}", s + 1),
                    name: format!("{} cohort {}", Buzzword().fake::<String>(), s + 1),
                    time_blocks: vec![
                        TimeBlock {
                            starts_at: start,
                            ends_at: start + Duration::hours(2),
                        },
                        TimeBlock {
                            starts_at: start + Duration::days(2),
                            ends_at: start + Duration::days(2) + Duration::hours(2),
                        },
                    ],
                }
            })
            .collect();

        let course = course_repo
            .create(Course {
                id: Uuid::new_v4(),
                title: CatchPhrase().fake(),
                description: Sentence(5..12).fake(),
                price_cents: 5_000 + (i as i64) * 2_500,
                currency: "USD".to_string(),
                sessions,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;
        println!("  ✅ {} ({})", course.title, course.id);
        course_ids.push(course.id);
    }

    println!("🪑 Creating sample bookings...");
    for course_id in course_ids.iter().take(2) {
        let booking = booking_repo
            .create(Booking {
                id: Uuid::new_v4(),
                student_id: Uuid::new_v4(),
                course_id: *course_id,
                session_id: Some("s1".to_string()),
                status: BookingStatus::Pending,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;
        println!("  ✅ Booking {} for course {}", booking.id, course_id);
    }

    println!("🎉 Seeding complete!");
    Ok(())
}
