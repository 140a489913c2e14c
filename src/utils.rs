use std::env;

fn show_backtrace() -> bool {
    if log::max_level() >= log::LevelFilter::Debug {
        return true;
    }

    matches!(env::var("RUST_BACKTRACE").as_deref(), Ok("1" | "full"))
}

/// Logs a fatal error, with its backtrace when debugging.
///
/// The whole cause chain is printed on a single record so it also lands as
/// one row of the `logs` table.
pub fn report_error(e: &anyhow::Error) {
    if show_backtrace() {
        log::error!("{:?}", e);
    } else {
        log::error!("{:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    #[test]
    fn cause_chain_is_kept() {
        let err = Err::<(), _>(anyhow::anyhow!("disk full"))
            .context("Error opening the event store")
            .unwrap_err();
        assert_eq!(format!("{err:#}"), "Error opening the event store: disk full");
    }
}
