use std::sync::Arc;

use anyhow::Result;
use parking_lot::FairMutex;

use husk::{
    BufferPoolManager, Config, DataType, Executor, Field, FilterExecutor, JoinExecutor, JoinType, ProjectionExecutor,
    Record, Schema, SeqScanExecutor, SortExecutor, TableHandle, Value,
};

fn users_schema() -> Schema {
    Schema::new(vec![Field::new("id", DataType::I32), Field::new("age", DataType::U16)])
}

fn logins_schema() -> Schema {
    Schema::new(vec![Field::new("user_id", DataType::I32), Field::new("count", DataType::U32)])
}

fn main() -> Result<()> {
    let config = Config::default();
    let bpm = Arc::new(FairMutex::new(BufferPoolManager::new(&config, "data")?));

    let mut users = TableHandle::open(bpm.clone(), 1, users_schema(), husk::Layout::NAry)?;
    users.insert_record(&[Value::I32(1), Value::U16(34)])?;
    users.insert_record(&[Value::I32(2), Value::U16(21)])?;
    users.insert_record(&[Value::I32(3), Value::U16(58)])?;
    users.insert_record(&[Value::Null, Value::U16(19)])?;

    let mut logins = TableHandle::open(bpm, 2, logins_schema(), husk::Layout::NAry)?;
    logins.insert_record(&[Value::I32(1), Value::U32(12)])?;
    logins.insert_record(&[Value::I32(1), Value::U32(8)])?;
    logins.insert_record(&[Value::I32(3), Value::U32(1)])?;

    let over_thirty_schema = users_schema();
    let predicate = std::rc::Rc::new(move |record: &Record| match record.get_value(&over_thirty_schema, 1) {
        Value::U16(age) => age >= 30,
        _ => false,
    });
    let scan = SeqScanExecutor::new(users.clone());
    let mut filtered = FilterExecutor::new(Box::new(scan), predicate);
    filtered.init()?;

    println!("users 30 or older:");
    while !filtered.is_end() {
        let schema = filtered.get_out_schema().clone();
        let record = filtered.get_record();
        println!("  id={:?} age={:?}", record.get_value(&schema, 0), record.get_value(&schema, 1));
        filtered.next()?;
    }

    let ids_only = users_schema().project(&["id"]);
    let scan = SeqScanExecutor::new(users.clone());
    let mut projection = ProjectionExecutor::new(Box::new(scan), ids_only.clone());
    projection.init()?;

    println!("every user id:");
    while !projection.is_end() {
        println!("  {:?}", projection.get_record().get_value(&ids_only, 0));
        projection.next()?;
    }

    let left_schema = users_schema();
    let right_schema = logins_schema();
    let condition = std::rc::Rc::new(move |left: &Record, right: &Record| {
        left.get_value(&left_schema, 0) == right.get_value(&right_schema, 0)
    });
    let left = SeqScanExecutor::new(users.clone());
    let right = SeqScanExecutor::new(logins.clone());
    let mut join = JoinExecutor::new(Box::new(left), Box::new(right), JoinType::Left, condition);
    join.init()?;

    println!("users left-joined with their logins:");
    while !join.is_end() {
        let schema = join.get_out_schema().clone();
        let record = join.get_record();
        println!(
            "  id={:?} age={:?} login_count={:?}",
            record.get_value(&schema, 0),
            record.get_value(&schema, 1),
            record.get_value(&schema, 3)
        );
        join.next()?;
    }

    let key_schema = users_schema().project(&["age"]);
    let scan = SeqScanExecutor::new(users.clone());
    let mut sorted = SortExecutor::new(Box::new(scan), key_schema.clone(), false, config.sort_buffer_size);
    sorted.init()?;

    println!("users sorted by age:");
    while !sorted.is_end() {
        let schema = sorted.get_out_schema().clone();
        println!("  age={:?}", sorted.get_record().get_value(&schema, 1));
        sorted.next()?;
    }

    Ok(())
}
