use crate::infra::{build_service, parse_timestamp, ApiService};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use course_commission::commission::{
    CategoryId, CommissionError, CourseId, FixedClock, HeaderId, HeaderUpdate, NewDetail,
    NewHeader,
};
use course_commission::config::CommissionConfig;
use course_commission::error::AppError;
use std::sync::Arc;

const DEMO_COURSE: CourseId = CourseId(101);
const DEMO_CATEGORY: CategoryId = CategoryId(7);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Pin the demo clock (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let now = args.at.unwrap_or_else(Utc::now);
    let clock = FixedClock::new(now);
    let service = build_service(&CommissionConfig::default(), Arc::new(clock));

    println!("Course Commission Engine demo");
    println!(
        "- course {} in category {} at {}",
        DEMO_COURSE,
        DEMO_CATEGORY,
        now.to_rfc3339()
    );
    println!();

    let header = service.create_header(NewHeader {
        name: "Default split".to_string(),
        description: Some("Catalogue-wide fallback".to_string()),
        ..NewHeader::default()
    })?;
    service.create_detail(header.id, detail(None, None, 30, 1))?;
    print_split(&service, now, "1. general rule only")?;

    service.create_detail(header.id, detail(None, Some(DEMO_CATEGORY), 25, 1))?;
    print_split(&service, now, "2. category rule added")?;

    service.create_detail(header.id, detail(Some(DEMO_COURSE), None, 20, 5))?;
    print_split(&service, now, "3. course rule added")?;

    expire_header(&service, header.id, now - Duration::days(1))?;
    print_split(&service, now, "4. header ended yesterday")?;

    let replacement = service.create_header(NewHeader {
        name: "Replacement split".to_string(),
        ..NewHeader::default()
    })?;
    match service.create_detail(replacement.id, detail(None, None, 0, 1)) {
        Err(CommissionError::Validation { field, message }) => {
            println!("5. platform rate 0 / instructor rate 100");
            println!("   rejected on {field}: {message}");
        }
        Ok(created) => println!(
            "5. unexpectedly stored detail {} with rate {}",
            created.id, created.rate
        ),
        Err(other) => return Err(other.into()),
    }

    let stats = service.stats()?;
    println!();
    println!(
        "Configuration revision {}: {} headers ({} active, {} expired), {} details",
        stats.revision,
        stats.total_headers,
        stats.active_headers,
        stats.expired_headers,
        stats.total_details
    );
    Ok(())
}

fn detail(
    course_id: Option<CourseId>,
    category_id: Option<CategoryId>,
    platform_rate: i32,
    priority: i32,
) -> NewDetail {
    NewDetail {
        course_id,
        category_id,
        platform_rate,
        priority,
        is_active: true,
    }
}

fn expire_header(
    service: &ApiService,
    header_id: HeaderId,
    end_date: DateTime<Utc>,
) -> Result<(), CommissionError> {
    service.update_header(
        header_id,
        HeaderUpdate {
            end_date: Some(Some(end_date)),
            ..HeaderUpdate::default()
        },
    )?;
    Ok(())
}

fn print_split(service: &ApiService, at: DateTime<Utc>, label: &str) -> Result<(), AppError> {
    println!("{label}");
    match service.resolve(DEMO_COURSE, DEMO_CATEGORY, at) {
        Ok(resolution) => println!(
            "   {}% platform / {}% instructor via detail {} ({:?} scope)",
            resolution.rate.platform_rate(),
            resolution.rate.instructor_rate(),
            resolution.detail_id,
            resolution.scope.kind()
        ),
        Err(err @ CommissionError::NoApplicableRule { .. }) => println!("   {err}"),
        Err(other) => return Err(other.into()),
    }
    Ok(())
}
