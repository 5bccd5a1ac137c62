use minisql::engine::Engine;
use minisql::row::{DataType, Schema, Value};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    println!("MiniSQL - a disk-oriented storage engine in Rust");
    println!("================================================\n");

    let db_path = "demo.db";
    let engine = Engine::open(db_path).expect("failed to open database");

    engine
        .create_table(
            "inventory",
            Schema::builder()
                .primary_key_column("id", DataType::Int)
                .column("name", DataType::Char(16))
                .nullable_column("price", DataType::Float)
                .build(),
        )
        .expect("failed to create table");
    println!("Created table 'inventory'");

    let table = engine.table("inventory").expect("table handle");
    let items = [
        (1, "bolt", Some(0.10)),
        (2, "nut", Some(0.05)),
        (3, "washer", None),
        (4, "screw", Some(0.12)),
    ];
    for (id, name, price) in items {
        let price = price.map(Value::Float).unwrap_or(Value::Null);
        let rid = table
            .insert(vec![Value::Int(id), Value::Char(name.into()), price])
            .expect("insert");
        println!("Inserted {name} at {rid}");
    }

    let pk = engine.index("inventory_pkey").expect("index handle");
    let rid = pk
        .lookup(&[Value::Int(3)])
        .expect("lookup")
        .expect("id 3 present");
    let row = table.get(rid).expect("fetch");
    println!("\nLookup id=3 -> {rid}: {:?}", row.values());

    println!("\nRange id in [2, 4]:");
    let scan = pk
        .range(Some(&[Value::Int(2)]), true, Some(&[Value::Int(4)]), true)
        .expect("range");
    for entry in scan {
        let (_, rid) = entry.expect("range entry");
        let row = table.get(rid).expect("fetch");
        println!("  {rid}: {:?}", row.values());
    }

    println!("\nFull scan:");
    for item in table.scan().expect("scan") {
        let (rid, row) = item.expect("scan row");
        println!("  {rid}: {:?}", row.values());
    }

    let stats = engine.pool_stats();
    println!(
        "\nPool: {} frames, {} free, {} hits, {} misses",
        stats.pool_size, stats.free_frames, stats.hits, stats.misses
    );

    engine.close().expect("close");
    std::fs::remove_file(db_path).ok();
    println!("\nDone.");
}
