use crate::cli::args::PlanArgs;
use crate::exit_codes;
use tribunal_core::config::load_suite;
use tribunal_core::engine::runner::RunPlan;
use tribunal_core::model::temperature_label;
use tribunal_core::variants::VariantGenerator;

pub fn run(args: PlanArgs) -> anyhow::Result<i32> {
    let loaded = match load_suite(&args.suite) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let suite = &loaded.definition;
    let plan = match RunPlan::build(&VariantGenerator::new(), suite) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    println!("candidates: {}", suite.candidates().len());
    println!("scenarios: {}", suite.scenarios().len());
    println!("variants: {}", plan.variants.len());
    for v in &plan.variants {
        println!("  {}", v.name);
    }
    let temps: Vec<String> = suite
        .temperatures()
        .iter()
        .map(|t| temperature_label(*t))
        .collect();
    println!("temperatures: {}", temps.join(", "));
    println!("combinations: {}", plan.combinations);
    println!(
        "requests: {} generation + up to {} judge",
        plan.combinations * suite.candidates().len(),
        plan.combinations
    );
    Ok(exit_codes::SUCCESS)
}
