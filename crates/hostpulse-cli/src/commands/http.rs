use hostpulse_core::{TopicTemplate, display_chain};
use hostpulse_transports::http::{Endpoint, HttpConfig, HttpTransport};

use super::SamplingArgs;

pub struct HttpCommandConfig<'a> {
    pub sampling: &'a SamplingArgs,
    pub client_id: String,
    pub username: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    pub login_endpoint: String,
    pub retries: u32,
    pub session_header: String,
    pub topic_template: String,
    pub check_interval: u64,
}

pub fn run(cfg: HttpCommandConfig<'_>) {
    let password = match cfg.password {
        Some(password) => password,
        None => match rpassword::prompt_password(format!("Password for {}: ", cfg.username)) {
            Ok(password) => password,
            Err(e) => {
                eprintln!("Error reading password: {e}");
                std::process::exit(1);
            }
        },
    };
    let mut config = HttpConfig::new(cfg.client_id, cfg.username, password);
    config.data = Endpoint::http(&cfg.host, cfg.port, cfg.endpoint);
    config.login = Endpoint::http(&cfg.host, cfg.port, cfg.login_endpoint);
    config.session_header = cfg.session_header;
    config.max_retries = cfg.retries;
    config.topics = TopicTemplate::new(cfg.topic_template);

    let data_endpoint = config.data.to_string();
    let transport = match HttpTransport::connect(config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", display_chain(&e));
            std::process::exit(1);
        }
    };

    eprintln!(
        "posting events to {data_endpoint} every {}s",
        cfg.check_interval
    );
    let checker = cfg.sampling.checker(Box::new(transport));
    super::run_until_interrupted(checker, cfg.check_interval);
}
