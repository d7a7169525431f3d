use cross_matcher::Exchange;
use cross_matcher::clock::{Clock, SystemClock};
use cross_matcher::ports::NoopNotifier;
use cross_matcher::session::SessionManager;
use cross_matcher::types::OrderSide;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Load testing tool for sustained performance measurement
fn main() {
    println!("=== Exchange Load Testing ===\n");

    test_sustained_limit_orders();
    test_mixed_workload();
    test_concurrent_access();
}

fn new_exchange() -> Arc<Exchange> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = Arc::new(SessionManager::new(Duration::from_secs(1800), clock.clone()));
    Arc::new(Exchange::new(Arc::new(NoopNotifier), sessions, clock))
}

fn side_for(n: u64) -> OrderSide {
    if n % 2 == 0 { OrderSide::Bid } else { OrderSide::Ask }
}

fn test_sustained_limit_orders() {
    println!("📈 Testing sustained limit orders...");

    let duration = Duration::from_secs(10);
    let start = Instant::now();
    let exchange = new_exchange();
    let mut operations = 0u64;

    while start.elapsed() < duration {
        let side = side_for(operations);
        // Bids below asks, so nothing crosses
        let price = match side {
            OrderSide::Bid => 10000 - (operations % 500),
            OrderSide::Ask => 10100 + (operations % 500),
        };
        let _ = exchange.insert_limit_order(side, 1 + operations % 100, price, "load");
        operations += 1;
    }

    let elapsed = start.elapsed();
    println!("   Operations: {}", operations);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!("   Throughput: {:.0} ops/sec", operations as f64 / elapsed.as_secs_f64());
    println!("   Orders in book: {}\n", exchange.total_orders());
}

fn test_mixed_workload() {
    println!("🔄 Testing mixed workload...");

    let duration = Duration::from_secs(10);
    let start = Instant::now();
    let exchange = new_exchange();
    let mut resting = Vec::new();

    let mut operations = 0u64;
    let mut fills = 0u64;
    let mut misses = 0u64;
    let mut cancellations = 0u64;

    while start.elapsed() < duration {
        match operations % 5 {
            0 | 1 => {
                let side = side_for(operations / 5);
                let price = match side {
                    OrderSide::Bid => 9990 + operations % 10,
                    OrderSide::Ask => 10010 - operations % 10,
                };
                if let Ok(ack) = exchange.insert_limit_order(side, 5, price, "maker") {
                    resting.push(ack.value);
                }
            }
            2 => {
                let _ = exchange.insert_stop_order(side_for(operations / 5), 3, 10005, "stopper");
            }
            3 => match exchange.insert_market_order(side_for(operations / 5), 4, "taker") {
                Ok(ack) if ack.value.is_some() => fills += 1,
                _ => misses += 1,
            },
            _ => {
                if let Some(order_id) = resting.pop() {
                    if exchange.cancel_order(order_id, "maker").is_ok() {
                        cancellations += 1;
                    }
                }
            }
        }
        operations += 1;
    }

    let elapsed = start.elapsed();
    println!("   Operations: {}", operations);
    println!("   Market fills: {}", fills);
    println!("   Market misses: {}", misses);
    println!("   Cancellations: {}", cancellations);
    println!("   Completed orders: {}", exchange.history_len());
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!("   Throughput: {:.0} ops/sec", operations as f64 / elapsed.as_secs_f64());
    println!("   Orders in book: {}\n", exchange.total_orders());
}

fn test_concurrent_access() {
    println!("⚡ Testing concurrent access...");

    let exchange = new_exchange();
    let operations = Arc::new(AtomicU64::new(0));
    let duration = Duration::from_secs(5);

    let num_threads = 4u64;
    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let exchange = Arc::clone(&exchange);
            let operations = Arc::clone(&operations);
            let user = format!("trader{}", thread_id);

            thread::spawn(move || {
                let start = Instant::now();
                let mut local_ops = 0u64;

                while start.elapsed() < duration {
                    let side = side_for(local_ops + thread_id);
                    if local_ops % 3 == 2 {
                        let _ = exchange.insert_market_order(side, 2, &user);
                    } else {
                        let price = match side {
                            OrderSide::Bid => 9900 + local_ops % 100,
                            OrderSide::Ask => 10000 + local_ops % 100,
                        };
                        let _ = exchange.insert_limit_order(side, 10, price, &user);
                    }
                    local_ops += 1;
                }

                operations.fetch_add(local_ops, Ordering::Relaxed);
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            eprintln!("   worker thread panicked");
        }
    }

    let total_ops = operations.load(Ordering::Relaxed);
    println!("   Threads: {}", num_threads);
    println!("   Total operations: {}", total_ops);
    println!("   Duration: {:.2}s", duration.as_secs_f64());
    println!("   Throughput: {:.0} ops/sec", total_ops as f64 / duration.as_secs_f64());
    println!("   Ids issued: {}", exchange.next_order_id());
    println!("   Orders in book: {}\n", exchange.total_orders());
}
