/// quick start - one loan through the guarantor flow to approval
use coop_lending_rs::{
    ActorContext, GuarantorDecision, LoanDesk, MemoryDispatcher, MemoryStore, Money, SafeTimeProvider,
    StaticDirectory, TimeSource,
};
use chrono::{TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    ));
    let directory = StaticDirectory::new()
        .with_member("M-100", "Ada Obi")
        .with_member("M-200", "Bola Ade")
        .with_member("M-300", "Chidi Eze");
    let desk = LoanDesk::new(MemoryStore::new(), directory, MemoryDispatcher::new(), &time);

    let ada = ActorContext::member("M-100");
    let admin = ActorContext::admin("ADMIN-1");

    // draft a 100,000 request and ask two colleagues to guarantee it
    let loan = desk.create_loan(&ada, "M-100", "2024-06", Money::from_major(100_000))?;
    let first = desk.request_guarantor(&ada, loan.id, "M-200")?;
    let second = desk.request_guarantor(&ada, loan.id, "M-300")?;
    println!("created loan {} ({})", loan.id, desk.get_loan(&ada, loan.id)?.status);

    // both guarantors approve
    desk.respond(&ActorContext::member("M-200"), first.id, GuarantorDecision::Approve, None)?;
    desk.respond(&ActorContext::member("M-300"), second.id, GuarantorDecision::Approve, None)?;
    println!("after guarantors: {}", desk.get_loan(&ada, loan.id)?.status);

    // admin approves 80,000 of it
    let approved = desk.approve(&admin, loan.id, Some(Money::from_major(80_000)), false)?;
    println!(
        "approved {} of {}, outstanding {}, monthly repayment {}",
        approved.effective_amount(),
        approved.requested_amount,
        approved.outstanding_amount.unwrap_or(Money::ZERO),
        approved.monthly_repayment
    );

    // print current state
    println!("{}", desk.loan_view(&admin, loan.id)?.to_json_pretty()?);

    for message in desk.dispatcher().sent() {
        println!("-> {}: {}", message.member_id, message.title);
    }

    Ok(())
}
