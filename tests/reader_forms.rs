use clcore::conditions::{ConditionKind, LispError};
use clcore::context::GlobalContext;
use clcore::eval::Interpreter;
use clcore::process::Process;
use clcore::reader::{read_all, read_from_string, DispatchPolicy, Reader, ReaderOptions};
use clcore::streams::{CharacterInputStream, EofPolicy};
use clcore::symbol::PackageId;
use clcore::types::Value;
use std::io::Cursor;

fn syms(globals: &GlobalContext, names: &[&str]) -> Vec<Value> {
    names.iter().map(|n| globals.symbol(n)).collect()
}

#[test]
fn test_consecutive_reads_are_whitespace_idempotent() {
    let globals = GlobalContext::new();
    let mut stream = CharacterInputStream::from_string("  (a b)   (c d)");
    let mut reader = Reader::new(&mut stream, &globals);
    let eof = EofPolicy::Return(globals.keyword("EOF"));

    let first = reader.read_form(&eof).unwrap();
    let second = reader.read_form(&eof).unwrap();
    assert_eq!(first, Value::list(syms(&globals, &["A", "B"])));
    assert_eq!(second, Value::list(syms(&globals, &["C", "D"])));
    assert_eq!(reader.read_form(&eof).unwrap(), globals.keyword("EOF"));
}

#[test]
fn test_read_form_consumes_one_trailing_whitespace() {
    let globals = GlobalContext::new();
    let mut stream = CharacterInputStream::from_string("(a)  b");
    let mut reader = Reader::new(&mut stream, &globals);
    reader.read_form(&EofPolicy::Error).unwrap();
    assert_eq!(reader.stream().offset(), 4);
    assert_eq!(reader.read_char(&EofPolicy::Error).unwrap(), Value::Char(' '));
}

#[test]
fn test_token_terminator_and_trailing_whitespace_are_consumed() {
    let globals = GlobalContext::new();
    let eof = EofPolicy::Error;

    // The token eats its terminating space and read_form eats one more
    let mut stream = CharacterInputStream::from_string("foo  bar");
    let mut reader = Reader::new(&mut stream, &globals);
    assert_eq!(reader.read_form(&eof).unwrap(), globals.symbol("FOO"));
    assert_eq!(reader.read_line(&eof).unwrap(), Value::string("bar"));

    let mut stream = CharacterInputStream::from_string("foo   bar");
    let mut reader = Reader::new(&mut stream, &globals);
    reader.read_form(&eof).unwrap();
    assert_eq!(reader.read_line(&eof).unwrap(), Value::string(" bar"));

    // A parenthesis after a token stays in the stream
    let mut stream = CharacterInputStream::from_string("foo)");
    let mut reader = Reader::new(&mut stream, &globals);
    reader.read_form(&eof).unwrap();
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char(')'));
}

#[test]
fn test_read_preserving_whitespace_leaves_separator() {
    let globals = GlobalContext::new();
    let eof = EofPolicy::Error;

    let mut stream = CharacterInputStream::from_string("x y");
    let mut reader = Reader::new(&mut stream, &globals);
    assert_eq!(
        reader.read_preserving_whitespace(&eof).unwrap(),
        globals.symbol("X")
    );
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char('y'));

    let mut stream = CharacterInputStream::from_string("x  y");
    let mut reader = Reader::new(&mut stream, &globals);
    reader.read_preserving_whitespace(&eof).unwrap();
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char(' '));

    let mut stream = CharacterInputStream::from_string("(x) y");
    let mut reader = Reader::new(&mut stream, &globals);
    reader.read_preserving_whitespace(&eof).unwrap();
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char(' '));
    assert_eq!(
        reader.read_preserving_whitespace(&eof).unwrap(),
        globals.symbol("Y")
    );
}

#[test]
fn test_eof_policies() {
    let globals = GlobalContext::new();
    let err = read_from_string(&globals, "   ").unwrap_err();
    assert_eq!(err.kind(), ConditionKind::EndOfFile);

    let mut stream = CharacterInputStream::from_string("");
    let mut reader = Reader::new(&mut stream, &globals);
    let sentinel = Value::string("done");
    assert_eq!(
        reader.read_form(&EofPolicy::Return(sentinel.clone())).unwrap(),
        sentinel
    );

    // An unfinished form is an error whatever the policy
    let mut stream = CharacterInputStream::from_string("(a b");
    let mut reader = Reader::new(&mut stream, &globals);
    let err = reader.read_form(&EofPolicy::Return(Value::Nil)).unwrap_err();
    assert!(matches!(err, LispError::EndOfFile));
}

#[test]
fn test_dotted_lists() {
    let globals = GlobalContext::new();
    let a = globals.symbol("A");
    let b = globals.symbol("B");
    let c = globals.symbol("C");

    assert_eq!(
        read_from_string(&globals, "(a . b)").unwrap(),
        Value::cons(a.clone(), b.clone())
    );
    assert_eq!(
        read_from_string(&globals, "(a b . c)").unwrap(),
        Value::cons(a.clone(), Value::cons(b.clone(), c))
    );
    assert_eq!(
        read_from_string(&globals, "(a . ; tail\n b)").unwrap(),
        Value::cons(a, b)
    );

    assert!(matches!(
        read_from_string(&globals, "(. a)"),
        Err(LispError::NothingBeforeDot { .. })
    ));
    assert!(matches!(
        read_from_string(&globals, "(a . b c)"),
        Err(LispError::ExtraObjectAfterDot { .. })
    ));
    assert!(matches!(
        read_from_string(&globals, "(a . )"),
        Err(LispError::NothingAfterDot { .. })
    ));
}

#[test]
fn test_nested_block_comment() {
    let globals = GlobalContext::new();
    let v = read_from_string(&globals, "#| outer #| inner |# still-outer |# (x)").unwrap();
    assert_eq!(v, Value::list(syms(&globals, &["X"])));

    let err = read_from_string(&globals, "#| open #| inner |# never closed").unwrap_err();
    assert_eq!(err.kind(), ConditionKind::EndOfFile);
}

#[test]
fn test_unmatched_paren_reports_position() {
    let globals = GlobalContext::new();
    let mut stream = CharacterInputStream::from_string("(a)\n)");
    let mut reader = Reader::new(&mut stream, &globals);
    reader.read_form(&EofPolicy::Error).unwrap();
    match reader.read_form(&EofPolicy::Error) {
        Err(LispError::UnmatchedParen { position }) => {
            assert_eq!(position.offset, 5);
            assert_eq!(position.line, 1);
        }
        other => panic!("expected unmatched paren, got {other:?}"),
    }
}

#[test]
fn test_package_qualified_symbols() {
    let globals = GlobalContext::new();
    let app = globals.symbols_mut().create_package("APP");
    let hidden = globals.intern_in("HIDDEN", app);
    let shown = globals.intern_in("SHOWN", app);
    globals.symbols_mut().export_symbol(shown);

    assert_eq!(
        read_from_string(&globals, "app:shown").unwrap(),
        Value::Symbol(shown)
    );
    assert_eq!(
        read_from_string(&globals, "app::hidden").unwrap(),
        Value::Symbol(hidden)
    );
    assert!(matches!(
        read_from_string(&globals, "app:hidden"),
        Err(LispError::SymbolNotExternal { .. })
    ));
    assert!(matches!(
        read_from_string(&globals, "app:missing"),
        Err(LispError::SymbolNotFound { symbol, package }) if symbol == "MISSING" && package == "APP"
    ));
    assert_eq!(
        read_from_string(&globals, "cl:car").unwrap(),
        read_from_string(&globals, "car").unwrap()
    );
}

#[test]
fn test_keywords_and_current_package() {
    let globals = GlobalContext::new();
    let kw = read_from_string(&globals, ":test").unwrap();
    assert_eq!(kw, globals.keyword("TEST"));
    assert!(globals.symbols().is_keyword(kw.as_symbol().unwrap()));

    let app = globals.symbols_mut().create_package("APP");
    let mut stream = CharacterInputStream::from_string("local");
    let mut reader = Reader::new(&mut stream, &globals).with_package(app);
    let sym = reader.read_form(&EofPolicy::Error).unwrap().as_symbol().unwrap();
    assert_eq!(globals.symbols().symbol_package(sym), Some(app));
    assert_ne!(Value::Symbol(sym), globals.symbol("LOCAL"));
}

#[test]
fn test_function_and_vector_dispatch() {
    let globals = GlobalContext::new();
    assert_eq!(
        read_from_string(&globals, "#'car").unwrap(),
        Value::list([Value::Symbol(globals.syms.function), globals.symbol("CAR")])
    );
    assert_eq!(
        read_from_string(&globals, "#(1 a)").unwrap(),
        Value::Vector(vec![Value::Fixnum(1), globals.symbol("A")].into())
    );
    assert_eq!(
        read_from_string(&globals, "#()").unwrap(),
        Value::Vector(Vec::<Value>::new().into())
    );
    assert!(matches!(
        read_from_string(&globals, "#(a . b)"),
        Err(LispError::DottedVector { .. })
    ));
}

#[test]
fn test_character_dispatch_reads_one_character() {
    let globals = GlobalContext::new();
    assert_eq!(read_from_string(&globals, "#\\a").unwrap(), Value::Char('a'));
    assert_eq!(read_from_string(&globals, "#\\(").unwrap(), Value::Char('('));
    assert_eq!(read_from_string(&globals, "#\\ ").unwrap(), Value::Char(' '));

    // The rest of a would-be character name is a separate token
    let forms = read_all(&globals, "#\\space").unwrap();
    assert_eq!(forms, vec![Value::Char('s'), globals.symbol("PACE")]);
}

#[test]
fn test_feature_expressions() {
    let globals = GlobalContext::new();
    let read = |s: &str| read_all(&globals, s).unwrap();

    assert_eq!(read("#+clcore 1 2"), vec![Value::Fixnum(1), Value::Fixnum(2)]);
    assert_eq!(read("#-clcore 1 2"), vec![Value::Fixnum(2)]);
    assert_eq!(read("#+nope 1 2"), vec![Value::Fixnum(2)]);
    assert_eq!(read("#-nope 1"), vec![Value::Fixnum(1)]);
    assert_eq!(read("#+(or nope clcore) 1"), vec![Value::Fixnum(1)]);
    assert_eq!(read("#+(and clcore nope) 1"), Vec::<Value>::new());
    assert_eq!(read("#+(not nope) 1"), vec![Value::Fixnum(1)]);
    assert_eq!(read("(a #+nope b c)"), vec![Value::list(syms(&globals, &["A", "C"]))]);
}

#[test]
fn test_discarded_form_is_not_resolved() {
    let globals = GlobalContext::new();
    // Neither the unknown package nor the evaluation is attempted
    let forms = read_all(&globals, "#+nope (nowhere::x #.(car 5)) 3").unwrap();
    assert_eq!(forms, vec![Value::Fixnum(3)]);

    let before = globals.symbols().symbol_count();
    read_all(&globals, "#+nope (never-interned-symbol)").unwrap();
    assert_eq!(globals.symbols().symbol_count(), before);
}

#[test]
fn test_custom_features() {
    let globals = GlobalContext::new();
    let options = ReaderOptions {
        features: vec!["SBCL".to_string()],
        ..ReaderOptions::default()
    };
    let mut stream = CharacterInputStream::from_string("#+clcore 1 #+sbcl 2");
    let mut reader = Reader::new(&mut stream, &globals).with_options(options);
    assert_eq!(reader.read_form(&EofPolicy::Error).unwrap(), Value::Fixnum(2));
}

#[test]
fn test_uninterned_symbol() {
    let globals = GlobalContext::new();
    let g1 = read_from_string(&globals, "#:foo").unwrap();
    let g2 = read_from_string(&globals, "#:foo").unwrap();
    let sym = g1.as_symbol().unwrap();

    assert_eq!(globals.symbol_name(sym), "FOO");
    assert_eq!(globals.symbols().symbol_package(sym), None);
    assert!(!g1.is_eq(&g2));
    assert_ne!(g1, globals.symbol("FOO"));
}

#[test]
fn test_read_time_evaluation() {
    let globals = GlobalContext::new();
    let mut process = Process::default();
    let mut interp = Interpreter::new(&mut process, &globals);
    let mut stream = CharacterInputStream::from_string("(a #.(+ 1 2))");
    let mut reader = Reader::new(&mut stream, &globals).with_evaluator(&mut interp);
    assert_eq!(
        reader.read_form(&EofPolicy::Error).unwrap(),
        Value::list([globals.symbol("A"), Value::Fixnum(3)])
    );
}

#[test]
fn test_read_time_evaluation_refused() {
    let globals = GlobalContext::new();
    assert!(matches!(
        read_from_string(&globals, "#.(+ 1 2)"),
        Err(LispError::ReadEvalUnavailable)
    ));

    let mut process = Process::default();
    let mut interp = Interpreter::new(&mut process, &globals);
    let options = ReaderOptions {
        read_eval: false,
        ..ReaderOptions::default()
    };
    let mut stream = CharacterInputStream::from_string("#.(+ 1 2)");
    let mut reader = Reader::new(&mut stream, &globals)
        .with_options(options)
        .with_evaluator(&mut interp);
    assert!(matches!(
        reader.read_form(&EofPolicy::Error),
        Err(LispError::ReadEvalDisabled)
    ));
}

#[test]
fn test_bit_vector_dispatch_yields_nil() {
    let globals = GlobalContext::new();
    assert_eq!(
        read_all(&globals, "#* x").unwrap(),
        vec![Value::Nil, globals.symbol("X")]
    );
}

#[test]
fn test_unknown_dispatch_policies() {
    let globals = GlobalContext::new();
    assert_eq!(
        read_from_string(&globals, "(a #z b)").unwrap(),
        Value::list(syms(&globals, &["A", "B"]))
    );

    let options = ReaderOptions {
        unknown_dispatch: DispatchPolicy::Strict,
        ..ReaderOptions::default()
    };
    let mut stream = CharacterInputStream::from_string("(a #z b)");
    let mut reader = Reader::new(&mut stream, &globals).with_options(options);
    match reader.read_form(&EofPolicy::Error) {
        Err(LispError::UnknownDispatch { character, .. }) => assert_eq!(character, 'z'),
        other => panic!("expected unknown dispatch, got {other:?}"),
    }
}

#[test]
fn test_character_level_operations() {
    let globals = GlobalContext::new();
    let mut stream = CharacterInputStream::from_string("ab");
    let mut reader = Reader::new(&mut stream, &globals);
    let eof = EofPolicy::Return(Value::Nil);

    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char('a'));
    reader.unread_char('a');
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char('a'));
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Char('b'));
    assert_eq!(reader.read_char(&eof).unwrap(), Value::Nil);
    assert!(matches!(
        reader.read_char(&EofPolicy::Error),
        Err(LispError::EndOfFile)
    ));
}

#[test]
fn test_read_line_and_discard() {
    let globals = GlobalContext::new();
    let mut stream = CharacterInputStream::from_string("one\r\ntwo\nrest of input");
    let mut reader = Reader::new(&mut stream, &globals);
    let eof = EofPolicy::Return(Value::Nil);

    assert_eq!(reader.read_line(&eof).unwrap(), Value::string("one"));
    assert_eq!(reader.read_line(&eof).unwrap(), Value::string("two"));
    reader.discard_buffered_input().unwrap();
    assert_eq!(reader.read_line(&eof).unwrap(), Value::Nil);
    assert_eq!(reader.read_form(&eof).unwrap(), Value::Nil);
}

#[test]
fn test_buffered_reader_source() {
    let globals = GlobalContext::new();
    let input = Cursor::new("(defun f (x)\n  x)\n'done\n");
    let mut stream = CharacterInputStream::from_reader(input);
    let mut reader = Reader::new(&mut stream, &globals);

    let defun = reader.read_form(&EofPolicy::Error).unwrap();
    assert_eq!(defun.to_vec().map(|v| v.len()), Some(4));
    assert_eq!(
        reader.read_form(&EofPolicy::Error).unwrap(),
        Value::list([Value::Symbol(globals.syms.quote), globals.symbol("DONE")])
    );
    assert_eq!(reader.stream().line_number(), 3);
    assert!(reader.read_form(&EofPolicy::Return(Value::T)).unwrap() == Value::T);
}

#[test]
fn test_default_package_is_cl_user() {
    let globals = GlobalContext::new();
    let mut stream = CharacterInputStream::from_string("");
    let reader = Reader::new(&mut stream, &globals);
    assert_eq!(reader.package(), PackageId::CL_USER);
}

#[test]
fn test_printed_forms_read_back_equal() {
    let globals = GlobalContext::new();
    let samples = [
        r#"(a . b)"#,
        r#"(cl:car #(1 :key "say \"hi\"") -42 . #\()"#,
        r#"((nested (list)) #\( #\a :test "" -9223372036854775808)"#,
        r#"'(x ,y ,@z)"#,
    ];
    for text in samples {
        let form = read_from_string(&globals, text).unwrap();
        let printed = globals.render(&form);
        let reread = read_from_string(&globals, &printed).unwrap();
        assert_eq!(reread, form, "{text} printed as {printed}");
    }
}
