pub mod build;
mod macros;

/// One-line startup banner, usable before tracing is initialized.
pub fn banner() -> String {
    format!(
        "{} {} ({}, built at {} with rustc {})",
        build::PACKAGE,
        build::VERSION,
        build::COMMIT_HASH,
        build::BUILD_TIMESTAMP,
        build::RUSTC_COMMIT_HASH,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn banner_names_package() {
        assert!(banner().starts_with(build::PACKAGE));
    }
}
