#![allow(clippy::expect_used)]

//! Dump the keyword index of a container file.
//!
//! Usage:
//!   cargo run --example dump_index -p resfile-store -- CASE.UNRST [CASE.UNRST.index]
//!
//! With a second argument the index is loaded from (or written to) that
//! file. Set `RUST_LOG=debug` to see the scan.

use resfile_store::{Container, ContainerConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: dump_index <file> [index file]");
    let index_path = args.next();

    let config = ContainerConfig::default().with_tolerate_truncation(true);
    let container = match &index_path {
        Some(index_path) => Container::open_with_index(&path, index_path, config),
        None => Container::open(&path, config),
    }
    .expect("failed to open container");

    println!(
        "{path}: {} keywords, {:?}{}\n",
        container.index().len(),
        container.endian(),
        if container.is_formatted() { ", formatted" } else { "" }
    );

    for (position, entry) in container.index().entries().iter().enumerate() {
        println!(
            "{position:>6}  {:<8} {:>4} x {:>10}  @ {:>12}",
            entry.name(),
            entry.element_type(),
            entry.count(),
            entry.offset
        );
    }

    println!("\nDistinct keywords:");
    for name in container.index().distinct_names() {
        println!("  {name:<8} {:>5}", container.index().count_named(name));
    }

    if let Some(index_path) = index_path {
        container
            .write_index(&index_path)
            .expect("failed to write index file");
    }
    container.close().expect("failed to close container");
}
