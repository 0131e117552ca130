/// period limit - the second approval is refused when the period is full
use coop_lending_rs::{
    ActorContext, GuarantorDecision, LendingError, LoanDesk, MemoryDispatcher, MemoryStore, Money,
    PeriodLimitPatch, SafeTimeProvider, StaticDirectory, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== period limit example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let directory = StaticDirectory::new()
        .with_member("M-100", "Ada Obi")
        .with_member("M-200", "Bola Ade")
        .with_member("M-300", "Chidi Eze")
        .with_member("M-400", "Dayo Bello");
    let desk = LoanDesk::new(MemoryStore::new(), directory, MemoryDispatcher::new(), &time);
    let admin = ActorContext::admin("ADMIN-1");

    // 500,000 available for june, 450,000 of it already committed
    desk.set_period_limit(
        &admin,
        "2024-06",
        &PeriodLimitPatch::new()
            .limit_amount(Money::from_major(500_000))
            .notes("june payroll"),
    )?;
    let earlier = desk.create_loan(&admin, "M-400", "2024-06", Money::from_major(450_000))?;
    desk.approve(&admin, earlier.id, None, true)?;
    println!("usage before: {:?}", desk.period_usage(&admin, "2024-06")?);

    // a new 100,000 request collects its guarantors
    let ada = ActorContext::member("M-100");
    let loan = desk.create_loan(&ada, "M-100", "2024-06", Money::from_major(100_000))?;
    let first = desk.request_guarantor(&ada, loan.id, "M-200")?;
    let second = desk.request_guarantor(&ada, loan.id, "M-300")?;

    controller.advance(Duration::days(1));
    desk.respond(&ActorContext::member("M-200"), first.id, GuarantorDecision::Approve, None)?;
    println!("after first approval: {}", desk.get_loan(&ada, loan.id)?.status);

    controller.advance(Duration::days(1));
    match desk.respond(&ActorContext::member("M-300"), second.id, GuarantorDecision::Approve, None) {
        Err(LendingError::LimitExceeded { limit, current_total, requested, .. }) => {
            println!("refused: limit {}, current total {}, requested {}", limit, current_total, requested);
        }
        other => println!("unexpected outcome: {:?}", other),
    }
    println!("after second approval: {}", desk.get_loan(&ada, loan.id)?.status);
    println!("usage after: {:?}", desk.period_usage(&admin, "2024-06")?);

    for message in desk.dispatcher().sent_to("M-100") {
        println!("-> {}: {}", message.title, message.message);
    }

    Ok(())
}
