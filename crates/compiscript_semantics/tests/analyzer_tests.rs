//! Cross-construct semantic analysis integration tests.
//!
//! The module-level unit tests cover each rule in isolation; these
//! exercise whole programs mixing classes, control flow, and the
//! deferred validation pass.

use compiscript_base::Interner;
use compiscript_semantics::analyze_program;
use compiscript_syntax::{parse_program, Arenas, AstContext};

fn analyze(source: &str) -> Vec<String> {
    let arenas = Arenas::new();
    let ctx = AstContext::new(&arenas);
    let mut interner = Interner::new();
    let (program, parse_diags) = parse_program(source, ctx, &mut interner);
    assert!(parse_diags.is_empty(), "parse diagnostics: {:?}", parse_diags);
    analyze_program(&program, &mut interner)
        .diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect()
}

#[test]
fn complete_class_program_is_clean() {
    let messages = analyze(
        "class Animal {\n\
           var nombre: string;\n\
           function init(nombre: string) { this.nombre = nombre; }\n\
           function getName(): string { return nombre; }\n\
         }\n\
         class Perro : Animal {\n\
           function speak(): string { return \"guau\"; }\n\
         }\n\
         function main(): void {\n\
           let p: Perro = new Perro();\n\
           let s: string;\n\
           s = p.speak();\n\
           print(s);\n\
         }",
    );
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
}

#[test]
fn diagnostics_carry_line_and_column() {
    let messages = analyze("function f(): void {\n  break;\n}");
    assert_eq!(messages.len(), 1);
    assert!(
        messages[0].starts_with("Line 2:2 - "),
        "position missing: {}",
        messages[0]
    );
}

#[test]
fn multiple_independent_errors_are_all_reported() {
    let messages = analyze(
        "function f(): integer { let a: integer; a = true; }\n\
         function g(): void { break; }",
    );
    assert!(messages.iter().any(|m| m.contains("Cannot assign boolean")));
    assert!(messages.iter().any(|m| m.contains("Break statement must be inside a loop")));
    assert!(messages.iter().any(|m| m.contains("Function 'f' must return a value")));
}

#[test]
fn loop_scopes_nest_and_unwind() {
    let messages = analyze(
        "function main(): void {\n\
           for (let i: integer = 0; i < 3; i = i + 1) {\n\
             foreach (x in [1, 2, 3]) { if (x == 2) { continue; } }\n\
           }\n\
           let i: integer;\n\
           i = 9;\n\
         }",
    );
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
}

#[test]
fn try_catch_scopes_do_not_leak() {
    let messages = analyze(
        "function main(): void {\n\
           try { let dentro: integer; dentro = 1; } catch (err) { print(err); }\n\
           dentro = 2;\n\
         }",
    );
    assert!(messages.iter().any(|m| m.contains("Variable 'dentro' not declared")));
}

#[test]
fn ternary_and_logical_rules_compose() {
    let messages = analyze(
        "function main(): void { let a: integer; let b: boolean;\n\
           b = a > 0 && a < 10;\n\
           a = b ? 1 : 0;\n\
         }",
    );
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
}

#[test]
fn arity_pass_reports_each_bad_site() {
    let messages = analyze(
        "function main(): void {\n\
           saluda(1);\n\
           let x: integer;\n\
           x = doble();\n\
         }\n\
         function saluda(): void { }\n\
         function doble(n: integer): integer { return n * 2; }",
    );
    assert!(messages.iter().any(|m| m.contains("Error función saluda no acepta parámetros")));
    assert!(messages.iter().any(|m| {
        m.contains("Error función doble se esperaba parametro tipo integer para la funcion doble")
    }));
}

#[test]
fn method_resolution_spans_class_hierarchies() {
    let messages = analyze(
        "class Base { function valor(): integer { return 1; } }\n\
         class Derivada : Base { }\n\
         function main(): void { let d: Derivada; let v: integer; v = d.valor(); }",
    );
    assert!(messages.is_empty(), "unexpected diagnostics: {:?}", messages);
}
