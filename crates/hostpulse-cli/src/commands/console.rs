use hostpulse_core::ConsoleTransport;

use super::SamplingArgs;

pub fn run(sampling: &SamplingArgs, check_interval: u64) {
    let checker = sampling.checker(Box::new(ConsoleTransport::stdout()));
    run_banner(check_interval);
    super::run_until_interrupted(checker, check_interval);
}

fn run_banner(check_interval: u64) {
    eprintln!(
        "hostpulse v{}: printing to stdout every {check_interval}s (Ctrl+C to stop)",
        hostpulse_core::VERSION
    );
}
