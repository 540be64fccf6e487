use std::sync::{Arc, Mutex};
use std::thread;

use tether_core::{Done, Error, Init, Interpreter, InterpreterConfig, NativeType, NativeValue, RgbImage};

fn spawn() -> (Interpreter, Done) {
    Interpreter::spawn(InterpreterConfig::default(), Init::None).unwrap()
}

fn shutdown(interp: Interpreter, done: Done) {
    interp.evaluate("exit").unwrap();
    done.wait();
}

#[test]
fn set_then_read_back_from_another_thread() {
    let (interp, done) = spawn();
    let writer = interp.clone();
    thread::spawn(move || writer.set("x", 42i64).unwrap())
        .join()
        .unwrap();
    assert_eq!(interp.evaluate_as::<i64>("set x").unwrap(), 42);
    shutdown(interp, done);
}

#[test]
fn set_then_read_back_on_the_owning_thread() {
    let (interp, done) = spawn();
    let writer = interp.clone();
    thread::spawn(move || writer.set("x", 42i64).unwrap())
        .join()
        .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let inner = interp.clone();
    let sink = seen.clone();
    interp
        .register_command("readback", move || {
            assert!(inner.is_owner_thread());
            *sink.lock().unwrap() = Some(inner.evaluate_into(NativeType::I64, "set x"));
        })
        .unwrap();
    interp.evaluate("readback").unwrap();

    let seen = seen.lock().unwrap().take().unwrap();
    assert_eq!(seen.unwrap(), NativeValue::Int(42));
    shutdown(interp, done);
}

#[test]
fn concurrent_callers_are_serialized() {
    let (interp, done) = spawn();
    interp.set("counter", 0i64).unwrap();

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let interp = interp.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    interp.evaluate("incr counter").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(interp.evaluate_as::<i64>("set counter").unwrap(), 200);
    shutdown(interp, done);
}

#[test]
fn each_caller_gets_its_own_result() {
    let (interp, done) = spawn();
    let workers: Vec<_> = (0..8i64)
        .map(|n| {
            let interp = interp.clone();
            thread::spawn(move || {
                for round in 0..20i64 {
                    let expected = n * 1000 + round;
                    let got = interp
                        .evaluate_as::<i64>(&format!("set v{n} {expected}"))
                        .unwrap();
                    assert_eq!(got, expected);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    shutdown(interp, done);
}

#[test]
fn calls_from_one_thread_run_in_order() {
    let (interp, done) = spawn();
    interp.set("log", "").unwrap();
    for i in 0..50 {
        interp.evaluate(&format!("append log {i},")).unwrap();
    }
    let expected: String = (0..50).map(|i| format!("{i},")).collect();
    assert_eq!(interp.evaluate_as::<String>("set log").unwrap(), expected);
    shutdown(interp, done);
}

#[test]
fn small_queue_blocks_instead_of_failing() {
    let config = InterpreterConfig::default().with_queue_capacity(1);
    let (interp, done) = Interpreter::spawn(config, Init::None).unwrap();
    interp.set("n", 0i64).unwrap();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let interp = interp.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    interp.evaluate("incr n").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(interp.evaluate_as::<i64>("set n").unwrap(), 100);
    shutdown(interp, done);
}

#[test]
fn host_commands_run_on_the_owning_thread() {
    let config = InterpreterConfig::default().with_thread_name("script-owner");
    let (interp, done) = Interpreter::spawn(config, Init::None).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    interp
        .register_command("whereami", move || {
            let name = thread::current().name().map(str::to_string);
            sink.lock().unwrap().push(name);
        })
        .unwrap();
    interp.evaluate("whereami").unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("script-owner".to_string())]
    );
    shutdown(interp, done);
}

#[test]
fn owning_thread_calls_run_inline() {
    let (interp, done) = Interpreter::spawn(
        InterpreterConfig::default(),
        Init::callback(|interp| {
            interp.register_command("noop", || {})?;
            interp.evaluate("set inline yes")?;
            let value = interp.evaluate_as::<String>("set inline")?;
            assert_eq!(value, "yes");
            Ok(())
        }),
    )
    .unwrap();
    assert_eq!(interp.evaluate_as::<String>("set inline").unwrap(), "yes");
    shutdown(interp, done);
}

#[test]
fn host_command_may_call_back_into_the_interpreter() {
    let (interp, done) = spawn();
    let inner = interp.clone();
    interp
        .register_command("remember", move |value: String| {
            inner.set("remembered", value).unwrap();
        })
        .unwrap();
    interp.evaluate("remember hello").unwrap();
    assert_eq!(interp.evaluate_as::<String>("set remembered").unwrap(), "hello");
    shutdown(interp, done);
}

#[test]
fn evaluate_into_reports_script_and_conversion_errors() {
    let (interp, done) = spawn();
    assert_eq!(
        interp.evaluate_into(NativeType::U8, "set x 200").unwrap(),
        NativeValue::Uint(200)
    );

    let err = interp.evaluate_into(NativeType::U8, "set x 300").unwrap_err();
    assert_eq!(
        err.to_string(),
        "conversion error: integer value 300 out of range for u8"
    );

    let err = interp.evaluate_into(NativeType::I64, "nosuch").unwrap_err();
    assert!(matches!(err, Error::Script { .. }));
    assert_eq!(err.to_string(), "invalid command name \"nosuch\"");

    let err = interp
        .evaluate_into(NativeType::List(Box::new(NativeType::I64)), "set x 1")
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { .. }));
    shutdown(interp, done);
}

#[test]
fn evaluate_bytes_accepts_raw_scripts() {
    let (interp, done) = spawn();
    interp.evaluate_bytes(b"set raw \xff".to_vec()).unwrap();
    assert_eq!(
        interp.evaluate_into(NativeType::Bytes, "set raw").unwrap(),
        NativeValue::Bytes(bytes::Bytes::from_static(b"\xff"))
    );
    let err = interp.evaluate_as::<String>("set raw").unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
    shutdown(interp, done);
}

#[test]
fn error_filter_wraps_every_failure_once() {
    let (interp, done) = spawn();
    interp
        .set_error_filter(|err| Some(Error::filtered(format!("wrapped: {err}"), err)))
        .unwrap();
    let err = interp.evaluate("nosuch").unwrap_err();
    assert_eq!(err.to_string(), "wrapped: invalid command name \"nosuch\"");
    assert_eq!(
        err.root().to_string(),
        "invalid command name \"nosuch\""
    );

    interp.clear_error_filter().unwrap();
    let err = interp.evaluate("nosuch").unwrap_err();
    assert_eq!(err.to_string(), "invalid command name \"nosuch\"");
    shutdown(interp, done);
}

#[test]
fn error_filter_may_use_the_interpreter() {
    let (interp, done) = spawn();
    let inner = interp.clone();
    interp
        .set_error_filter(move |err| {
            // Runs on the owning thread; nested failures are not re-filtered.
            assert!(inner.evaluate("nosuch_either").is_err());
            inner.evaluate("incr failures").ok();
            Some(err)
        })
        .unwrap();
    interp.set("failures", 0i64).unwrap();
    assert!(interp.evaluate("nosuch").is_err());
    assert!(interp.evaluate("nosuch").is_err());
    interp.clear_error_filter().unwrap();
    assert_eq!(interp.evaluate_as::<i64>("set failures").unwrap(), 2);
    shutdown(interp, done);
}

#[test]
fn error_filter_may_suppress_errors() {
    let (interp, done) = spawn();
    interp.set_error_filter(|_| None).unwrap();
    interp.evaluate("nosuch").unwrap();
    assert_eq!(interp.evaluate_as::<i64>("nosuch").unwrap(), 0);
    assert_eq!(interp.evaluate_as::<String>("nosuch").unwrap(), "");
    shutdown(interp, done);
}

#[test]
fn panicking_error_filter_keeps_the_loop_alive() {
    let (interp, done) = spawn();
    interp
        .set_error_filter(|_| -> Option<Error> { panic!("filter bug") })
        .unwrap();
    let err = interp.evaluate("nosuch").unwrap_err();
    assert!(matches!(err, Error::Script { .. }));
    assert_eq!(err.to_string(), "invalid command name \"nosuch\"");
    assert_eq!(interp.evaluate_as::<i64>("set x 1").unwrap(), 1);

    interp.clear_error_filter().unwrap();
    shutdown(interp, done);
}

#[test]
fn exit_stops_the_loop_and_later_calls_fail() {
    let (interp, mut done) = spawn();
    assert!(!done.is_done());
    interp.evaluate("exit").unwrap();
    done.wait();
    assert!(matches!(interp.evaluate("set x 1"), Err(Error::Closed)));
    assert!(matches!(interp.set("x", 1i64), Err(Error::Closed)));
}

#[test]
fn failing_init_script_is_returned_from_spawn() {
    let err = Interpreter::spawn(InterpreterConfig::default(), "error {bad init}").unwrap_err();
    assert_eq!(err.to_string(), "bad init");
}

#[test]
fn failing_init_callback_is_returned_from_spawn() {
    let err = Interpreter::spawn(
        InterpreterConfig::default(),
        Init::callback(|_| Err(Error::invalid_config("nope"))),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn upload_image_creates_a_photo() {
    let (interp, done) = spawn();
    let mut image = RgbImage::new(3, 2).unwrap();
    image.put_pixel(2, 1, [10, 20, 30]);
    interp.upload_image("logo", &image).unwrap();

    assert_eq!(interp.evaluate_as::<i64>("image width logo").unwrap(), 3);
    assert_eq!(interp.evaluate_as::<i64>("image height logo").unwrap(), 2);
    assert_eq!(interp.evaluate_as::<String>("logo get 2 1").unwrap(), "10 20 30");
    shutdown(interp, done);
}

#[tokio::test(flavor = "multi_thread")]
async fn done_can_be_awaited() {
    let (interp, done) = spawn();
    let worker = interp.clone();
    let value = tokio::task::spawn_blocking(move || {
        worker.set("x", 7i64).unwrap();
        worker.evaluate_as::<i64>("set x").unwrap()
    })
    .await
    .unwrap();
    assert_eq!(value, 7);

    tokio::task::spawn_blocking(move || interp.evaluate("exit").unwrap())
        .await
        .unwrap();
    done.await;
}
