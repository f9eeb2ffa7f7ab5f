use vergen::{
    vergen,
    Config,
    ShaKind,
};

fn main() {
    let mut config = Config::default();
    *config.git_mut().sha_kind_mut() = ShaKind::Short;

    // builds from a source tarball have no git metadata; fall back to "<none>" at runtime
    if let Err(e) = vergen(config) {
        eprintln!("gslink-util: vergen failed: {}", e);
    }
}
