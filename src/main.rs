use std::error::Error;

use audiodup::synthetic_scan_demo;

fn main() -> Result<(), Box<dyn Error>> {
    let groups = synthetic_scan_demo()?;

    println!("duplicate groups: {}", groups.len());
    for group in &groups {
        println!(
            "  files {:?} (avg similarity {:.4})",
            group.file_ids, group.avg_similarity
        );
    }

    Ok(())
}
