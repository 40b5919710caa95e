use std::env;

fn main() {
    println!("cargo:rerun-if-changed=migrations");
    println!("cargo:rerun-if-changed=locales");

    println!(
        "cargo:rustc-env=GIT_SHA={}",
        env::var("GIT_SHA").unwrap_or("<unknown>".into())
    );
}
