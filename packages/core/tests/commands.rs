use std::sync::{Arc, Mutex};

use tether_core::{
    Callable, Done, EntryKind, Error, Init, Interpreter, InterpreterConfig, Method, MethodSet,
    NativeType, NativeValue,
};

fn spawn() -> (Interpreter, Done) {
    Interpreter::spawn(InterpreterConfig::default(), Init::None).unwrap()
}

fn shutdown(interp: Interpreter, done: Done) {
    interp.evaluate("exit").unwrap();
    done.wait();
}

type Log = Arc<Mutex<Vec<String>>>;

struct Heater {
    log: Log,
}

impl Heater {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl MethodSet for Heater {
    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new("TCLFoo", |h: &Heater| h.record("foo".into())),
            Method::new("TCL_Bar", |h: &Heater, level: u8, label: String| {
                h.record(format!("bar {level} {label}"))
            }),
            Method::new("Internal", |h: &Heater| h.record("internal".into())),
        ]
    }
}

struct Thermostat {
    log: Log,
}

impl MethodSet for Thermostat {
    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new("TCLTarget", |t: &Thermostat, degrees: i64| {
                t.log.lock().unwrap().push(format!("target {degrees}"))
            }),
            Method::dynamic(
                "TCLZone",
                vec![NativeType::String, NativeType::U8, NativeType::Bool],
                |t: &Thermostat, args| t.log.lock().unwrap().push(format!("{args:?}")),
            ),
        ]
    }
}

struct Quiet;

impl MethodSet for Quiet {
    fn methods() -> Vec<Method<Self>> {
        vec![Method::new("helper", |_: &Quiet| {})]
    }
}

#[test]
fn method_set_exposes_prefixed_methods() {
    let (interp, done) = spawn();
    let log = Log::default();
    interp
        .register_commands("ns", Heater { log: log.clone() })
        .unwrap();

    interp.evaluate("ns::Foo; ns::Bar 3 warm").unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["foo", "bar 3 warm"]);

    let commands = interp
        .evaluate_as::<String>("info commands ns::*")
        .unwrap();
    let mut commands: Vec<_> = commands.split_whitespace().collect();
    commands.sort_unstable();
    assert_eq!(commands, vec!["ns::Bar", "ns::Foo"]);
    assert_eq!(
        interp.evaluate_as::<String>("info commands ns::Internal").unwrap(),
        ""
    );
    shutdown(interp, done);
}

#[test]
fn method_set_namespaces_are_unique() {
    let (interp, done) = spawn();
    interp
        .register_commands("ns", Heater { log: Log::default() })
        .unwrap();
    let err = interp
        .register_commands("ns", Heater { log: Log::default() })
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateRegistration {
            kind: EntryKind::MethodSet,
            ..
        }
    ));

    interp.unregister_commands("ns").unwrap();
    assert!(interp.evaluate("ns::Foo").is_err());
    interp
        .register_commands("ns", Heater { log: Log::default() })
        .unwrap();
    interp.evaluate("ns::Foo").unwrap();
    shutdown(interp, done);
}

#[test]
fn method_set_without_exposed_methods_registers_nothing() {
    let (interp, done) = spawn();
    interp.register_commands("quiet", Quiet).unwrap();
    assert_eq!(
        interp.evaluate_as::<String>("info commands quiet::*").unwrap(),
        ""
    );
    interp.unregister_commands("quiet").unwrap();
    let err = interp.unregister_commands("quiet").unwrap_err();
    assert!(matches!(
        err,
        Error::NotFound {
            kind: EntryKind::MethodSet,
            ..
        }
    ));
    shutdown(interp, done);
}

#[test]
fn missing_arguments_take_zero_values_and_extras_are_ignored() {
    let (interp, done) = spawn();
    let seen: Log = Log::default();
    let sink = seen.clone();
    interp
        .register_command("show", move |n: i32, s: String, b: bool| {
            sink.lock().unwrap().push(format!("{n}|{s}|{b}"));
        })
        .unwrap();

    interp.evaluate("show").unwrap();
    interp.evaluate("show 5").unwrap();
    interp.evaluate("show 5 five yes extra ignored").unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["0||false", "5||false", "5|five|true"]
    );
    shutdown(interp, done);
}

#[test]
fn method_conversion_failure_is_a_script_error_and_skips_the_call() {
    let (interp, done) = spawn();
    let log = Log::default();
    interp
        .register_commands("t", Thermostat { log: log.clone() })
        .unwrap();

    let caught = interp
        .evaluate_as::<i64>("catch {t::Target abc} msg")
        .unwrap();
    assert_eq!(caught, 1);
    assert_eq!(
        interp.evaluate_as::<String>("set msg").unwrap(),
        "expected integer but got \"abc\""
    );

    let err = interp.evaluate("t::Target abc").unwrap_err();
    assert!(matches!(err, Error::Script { .. }));
    assert!(log.lock().unwrap().is_empty());

    interp.evaluate("t::Target 21").unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["target 21"]);
    shutdown(interp, done);
}

#[test]
fn dynamic_methods_receive_marshalled_arguments() {
    let (interp, done) = spawn();
    let log = Log::default();
    interp
        .register_commands("t", Thermostat { log: log.clone() })
        .unwrap();

    interp.evaluate("t::Zone hall 3 yes").unwrap();
    interp.evaluate("t::Zone attic").unwrap();
    let err = interp.evaluate("t::Zone cellar 300").unwrap_err();
    assert!(matches!(err, Error::Script { .. }));

    let expected = vec![
        vec![
            NativeValue::Str("hall".into()),
            NativeValue::Uint(3),
            NativeValue::Bool(true),
        ],
        vec![
            NativeValue::Str("attic".into()),
            NativeValue::Uint(0),
            NativeValue::Bool(false),
        ],
    ];
    let expected: Vec<_> = expected.iter().map(|args| format!("{args:?}")).collect();
    assert_eq!(*log.lock().unwrap(), expected);
    shutdown(interp, done);
}

#[test]
fn conversion_failure_is_a_script_error_and_skips_the_call() {
    let (interp, done) = spawn();
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    interp
        .register_command("takes_int", move |_: i64| {
            *counter.lock().unwrap() += 1;
        })
        .unwrap();

    let caught = interp
        .evaluate_as::<i64>("catch {takes_int abc} msg")
        .unwrap();
    assert_eq!(caught, 1);
    assert_eq!(
        interp.evaluate_as::<String>("set msg").unwrap(),
        "expected integer but got \"abc\""
    );

    let err = interp.evaluate("takes_int 1.5").unwrap_err();
    assert!(matches!(err, Error::Script { .. }));
    assert_eq!(*calls.lock().unwrap(), 0);
    shutdown(interp, done);
}

#[test]
fn host_results_are_not_visible_to_scripts() {
    let (interp, done) = spawn();
    interp.register_command("answer", || 42i64).unwrap();
    assert_eq!(interp.evaluate_as::<String>("answer").unwrap(), "");
    shutdown(interp, done);
}

#[test]
fn panicking_host_command_becomes_a_script_error() {
    let (interp, done) = spawn();
    interp
        .register_command("boom", || -> () { panic!("kaboom") })
        .unwrap();
    let err = interp.evaluate("boom").unwrap_err();
    assert_eq!(err.to_string(), "host command \"boom\" panicked: kaboom");
    // The loop survives.
    assert_eq!(interp.evaluate_as::<i64>("set x 1").unwrap(), 1);
    shutdown(interp, done);
}

#[test]
fn command_names_are_unique_until_unregistered() {
    let (interp, done) = spawn();
    interp.register_command("tick", || {}).unwrap();
    let err = interp.register_command("tick", || {}).unwrap_err();
    assert_eq!(err.to_string(), "command with name \"tick\" already exists");

    interp.unregister_command("tick").unwrap();
    assert!(interp.evaluate("tick").is_err());
    let err = interp.unregister_command("tick").unwrap_err();
    assert!(matches!(
        err,
        Error::NotFound {
            kind: EntryKind::Command,
            ..
        }
    ));
    interp.register_command("tick", || {}).unwrap();
    interp.evaluate("tick").unwrap();
    shutdown(interp, done);
}

#[test]
fn script_deletion_releases_the_name() {
    let (interp, done) = spawn();
    interp.register_command("gone", || {}).unwrap();
    interp.evaluate("rename gone {}").unwrap();
    interp.register_command("gone", || {}).unwrap();
    shutdown(interp, done);
}

#[test]
fn prebuilt_callables_carry_their_own_parameters() {
    let (interp, done) = spawn();
    let seen: Log = Log::default();
    let sink = seen.clone();
    let callable = Callable::new(vec![NativeType::U16, NativeType::Bytes], move |args| {
        sink.lock().unwrap().push(format!("{:?}", args));
    });
    interp.register_command("raw", callable).unwrap();
    interp.evaluate("raw 7 xy").unwrap();
    let expected = format!(
        "{:?}",
        vec![
            NativeValue::Uint(7),
            NativeValue::Bytes(bytes::Bytes::from_static(b"xy"))
        ]
    );
    assert_eq!(*seen.lock().unwrap(), vec![expected]);
    shutdown(interp, done);
}

#[test]
fn unsupported_parameter_types_are_rejected() {
    let (interp, done) = spawn();
    let callable = Callable::new(vec![NativeType::List(Box::new(NativeType::I64))], |_| {});
    let err = interp.register_command("lists", callable).unwrap_err();
    assert!(matches!(err, Error::InvalidCallable { .. }));
    assert!(interp.evaluate("lists").is_err());
    shutdown(interp, done);
}
