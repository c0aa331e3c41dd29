use hostpulse_core::{MetricName, TopicTemplate, display_chain, pretty};
use hostpulse_transports::listener::document_to_json;
use hostpulse_transports::{MqttConfig, MqttListener};

pub fn run(
    client_id: String,
    host: String,
    port: u16,
    topic_template: String,
    metrics: Vec<MetricName>,
) {
    let mut config = MqttConfig::new(client_id);
    config.host = host;
    config.port = port;
    config.topics = TopicTemplate::new(topic_template);

    let listener = match MqttListener::connect(&config, &metrics) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error: {}", display_chain(&e));
            std::process::exit(1);
        }
    };

    for topic in listener.topics() {
        println!("subscribing to topic {topic}");
    }

    let handle = listener.handle();
    if let Err(e) = ctrlc::set_handler(move || handle.stop()) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    listener.run(|topic, doc| {
        print!("{}", pretty::render(topic, &document_to_json(doc), 0));
    });
}
