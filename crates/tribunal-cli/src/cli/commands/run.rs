use crate::cli::args::RunArgs;
use crate::exit_codes;
use std::sync::Arc;
use std::time::Duration;
use tribunal_core::candidate::CandidateClient;
use tribunal_core::config::load_suite;
use tribunal_core::engine::runner::Runner;
use tribunal_core::judge::JudgeService;
use tribunal_core::providers::llm::fake::FakeClient;
use tribunal_core::providers::llm::openai::OpenAIClient;
use tribunal_core::providers::llm::tracing::TracingLlmClient;
use tribunal_core::providers::llm::LlmClient;
use tribunal_core::report::console::{render_summary, stderr_observer};

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let loaded = match load_suite(&args.suite) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    tracing::info!(suite = %args.suite.display(), fake = args.fake, "loaded suite");

    let mut policy = loaded.settings.run_policy();
    policy.parallel_generation |= args.parallel;
    if let Some(secs) = args.timeout {
        policy.timeout = Duration::from_secs(secs.max(1));
    }

    let inner: Arc<dyn LlmClient> = if args.fake {
        Arc::new(FakeClient::new())
    } else {
        match OpenAIClient::from_env() {
            Ok(client) => Arc::new(client),
            Err(e) => {
                eprintln!("config error: {}", e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        }
    };
    let client: Arc<dyn LlmClient> = Arc::new(TracingLlmClient::new(inner));

    let judge = JudgeService::new(loaded.judge.clone(), client.clone());
    let runner = Runner::new(CandidateClient::new(client), judge)
        .with_policy(policy)
        .with_observer(stderr_observer());

    let plan = match runner.plan(&loaded.definition) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    eprintln!(
        "{} combinations x {} candidates",
        plan.combinations,
        loaded.definition.candidates().len()
    );

    let store = match runner.run(&loaded.definition).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&store.report())?);
    } else {
        print!("{}", render_summary(&store));
    }
    Ok(exit_codes::SUCCESS)
}
