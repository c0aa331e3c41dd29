use hostpulse_core::detect_host_info;

pub fn run() {
    let info = detect_host_info();

    println!("hostpulse v{}", hostpulse_core::VERSION);
    println!();
    println!("  OS:        {}", info.os);
    println!("  Hostname:  {}", info.hostname);
    println!("  Arch:      {}", info.arch);
    println!(
        "  Distro:    {}",
        info.distro.as_deref().unwrap_or("unknown")
    );
    println!(
        "  Kernel:    {}",
        info.kernel.as_deref().unwrap_or("unknown")
    );
    println!("  CPUs:      {}", info.cpu_count);
    match info.loadavg {
        Some([l1, l5, l15]) => println!("  Load avg:  1m {l1:.2}  5m {l5:.2}  15m {l15:.2}"),
        None => println!("  Load avg:  unavailable"),
    }
}
