use std::process::Command;

fn main() {
    // Git commit hash（短）
    let commit = git(&["rev-parse", "--short", "HEAD"]);

    // Git commit hash（完整）
    let commit_full = git(&["rev-parse", "HEAD"]);

    // 构建时间（UTC）
    let build_time = utc_now();

    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=STACHE_GIT_COMMIT={commit}");
    println!("cargo:rustc-env=STACHE_GIT_COMMIT_FULL={commit_full}");
    println!("cargo:rustc-env=STACHE_BUILD_TIME={build_time}");
    println!("cargo:rustc-env=STACHE_BUILD_TARGET={target}");
    println!("cargo:rustc-env=STACHE_BUILD_PROFILE={profile}");

    // 仅在 git HEAD 变化时重新运行
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}

fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn utc_now() -> String {
    Command::new("date")
        .args(["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
