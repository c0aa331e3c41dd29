use std::time::Duration;

use hostpulse_core::{TopicTemplate, display_chain};
use hostpulse_transports::{MqttConfig, MqttTransport};

use super::SamplingArgs;

pub struct MqttCommandConfig<'a> {
    pub sampling: &'a SamplingArgs,
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub keepalive: u64,
    pub topic_template: String,
    pub check_interval: u64,
}

pub fn run(cfg: MqttCommandConfig<'_>) {
    let config = MqttConfig {
        client_id: cfg.client_id,
        host: cfg.host,
        port: cfg.port,
        keepalive: Duration::from_secs(cfg.keepalive),
        topics: TopicTemplate::new(cfg.topic_template),
    };

    let client_id = config.client_id.clone();
    let transport = match MqttTransport::connect(config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", display_chain(&e));
            std::process::exit(1);
        }
    };

    eprintln!(
        "publishing every {}s, run 'hostpulse listen -c {client_id}' to see the output",
        cfg.check_interval
    );
    let checker = cfg.sampling.checker(Box::new(transport));
    super::run_until_interrupted(checker, cfg.check_interval);
}
