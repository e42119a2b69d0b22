use std::{sync::Arc, time::SystemTime};

use vivarium::*;

// Define capability traits and implementor structs

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

trait DateLogger: Send + Sync {
    fn log_date(&self);
}

#[derive(Default)]
struct LoggerImpl;

impl Logger for LoggerImpl {
    fn log(&self, content: &str) {
        println!("{}", content);
    }
}

struct DateLoggerImpl {
    logger: Arc<dyn Logger>,
}

impl DateLoggerImpl {
    fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl DateLogger for DateLoggerImpl {
    fn log_date(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap();
        self.logger.log(&format!("{}s since epoch", now.as_secs()));
    }
}

fn main() -> Result<(), ContainerError> {
    let container = ServiceContainer::new();

    // Register the date logger before its dependency: the default lazy
    // policy constructs at resolution time, so the order does not matter.
    container.register(
        constructible!(dyn DateLogger: DateLoggerImpl, new, logger: Arc<dyn Logger>),
        None,
    )?;
    container.register(constructible!(dyn Logger: LoggerImpl), None)?;

    container.sanity_check()?;

    let b: Arc<dyn DateLogger> = container.resolve_required(None)?;

    b.log_date();

    Ok(())
}
