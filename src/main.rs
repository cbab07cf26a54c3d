//! xenon-emu entry point
//!
//! Wires the address space together, loads a guest image and drives the
//! step loop. Usage: `xenon-emu <image> [config.toml]`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info};
use xe_core::config::Config;
use xe_cpu::Cpu;
use xe_memory::constants::RAM_BASE;
use xe_memory::{FramebufferDevice, Mmu, Protection, RamDevice};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let image = match args.next() {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: xenon-emu <image> [config.toml]"),
    };
    let config = match args.next() {
        Some(path) => Config::load(Path::new(&path))
            .with_context(|| format!("loading config from {path}"))?,
        None => Config::default(),
    };
    xe_core::logging::init(&config);

    info!("starting xenon-emu");

    let mmu = Arc::new(Mmu::new());
    let ram = Arc::new(RamDevice::new("RAM", config.memory.ram_size));
    mmu.map_memory(
        ram,
        RAM_BASE,
        RAM_BASE + config.memory.ram_size,
        0,
        Protection::RWX,
    );
    let fb = Arc::new(FramebufferDevice::new(
        "FB",
        config.memory.framebuffer_width,
        config.memory.framebuffer_height,
    ));
    let fb_size = config.memory.framebuffer_width as u64 * config.memory.framebuffer_height as u64 * 4;
    mmu.map_memory(
        fb,
        config.memory.framebuffer_base,
        config.memory.framebuffer_base + fb_size,
        0,
        Protection::RW,
    );

    let entry = xe_loader::load_file(&mmu, &image, config.cpu.entry_point)
        .with_context(|| format!("loading {}", image.display()))?;

    let mut cpu = Cpu::with_vector_base(mmu, config.cpu.vector_base);
    let mut gpr = [0u32; 32];
    gpr[1] = config.cpu.stack_pointer;
    cpu.reset_to(entry, gpr);
    cpu.set_syscall_handler(|state, _| {
        // Minimal host call surface: r0 selects the call. Call 0 stops
        // the core; anything else is logged and ignored.
        match state.gpr(0) {
            0 => {
                info!(target: "cpu", "guest requested shutdown (r3=0x{:08X})", state.gpr(3));
                state.running = false;
            }
            other => info!(target: "cpu", "unhandled syscall {}", other),
        }
    });

    let limit = if config.cpu.step_limit == 0 {
        u64::MAX
    } else {
        config.cpu.step_limit
    };
    let result = cpu.run(limit);
    match &result {
        Ok(steps) => info!("halted after {} step(s) at PC=0x{:08X}", steps, cpu.state.pc),
        Err(err) => error!("execution failed: {err}"),
    }
    if config.debug.dump_on_halt {
        cpu.state.dump();
    }
    result.map(|_| ()).map_err(Into::into)
}
