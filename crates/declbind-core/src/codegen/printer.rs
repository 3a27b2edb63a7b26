//! C++ printer for the builder model.

use super::builder::{Expr, Function, Item, Stmt};

const INDENT: &str = "    ";

/// Line-oriented emitter tracking the current indentation level.
#[derive(Default)]
pub struct CppEmitter {
    out: String,
    level: usize,
}

impl CppEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    pub fn emit_line(&mut self, line: &str) {
        for _ in 0..self.level {
            self.out.push_str(INDENT);
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.out.push('\n');
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn emit_items(&mut self, items: &[Item]) {
        for item in items {
            self.emit_item(item);
        }
    }

    pub fn emit_item(&mut self, item: &Item) {
        match item {
            Item::Function(f) => self.emit_function(f),
            Item::Initializer { decl, rows } => {
                self.emit_line(&format!("{decl} ="));
                self.emit_line("{");
                self.indent();
                for row in rows {
                    self.emit_line(row);
                }
                self.dedent();
                self.emit_line("};");
                self.blank_line();
            }
            Item::Struct { name, fields } => {
                self.emit_line(&format!("struct {name}"));
                self.emit_line("{");
                self.indent();
                for field in fields {
                    self.emit_line(field);
                }
                self.dedent();
                self.emit_line("};");
                self.blank_line();
            }
            Item::Specialization { header, methods } => {
                for line in header {
                    self.emit_line(line);
                }
                self.emit_line("{");
                self.indent();
                for method in methods {
                    self.emit_function(method);
                }
                self.dedent();
                self.emit_line("};");
                self.blank_line();
            }
            Item::Line(text) => self.emit_line(text),
            Item::Blank => self.blank_line(),
        }
    }

    pub fn emit_function(&mut self, f: &Function) {
        self.emit_line(&f.signature);
        self.emit_line("{");
        self.indent();
        self.emit_stmts(&f.body);
        self.dedent();
        self.emit_line("}");
        self.blank_line();
    }

    pub fn emit_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.emit_stmt(stmt);
        }
    }

    pub fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl { ty, name, init } => match init {
                Some(value) => {
                    let value = self.render_expr(value);
                    self.emit_line(&format!("{ty} {name} = {value};"));
                }
                None => self.emit_line(&format!("{ty} {name};")),
            },
            Stmt::Expr(e) => {
                let text = self.render_expr(e);
                self.emit_line(&format!("{text};"));
            }
            Stmt::Return(value) => match value {
                Some(e) => {
                    let text = self.render_expr(e);
                    self.emit_line(&format!("return {text};"));
                }
                None => self.emit_line("return;"),
            },
            Stmt::If { cond, then } => {
                let text = self.render_expr(cond);
                self.emit_line(&format!("if ({text})"));
                if let [single @ (Stmt::Expr(_) | Stmt::Return(_))] = then.as_slice() {
                    self.indent();
                    self.emit_stmt(single);
                    self.dedent();
                } else {
                    self.emit_block(then);
                }
            }
            Stmt::Block(body) => self.emit_block(body),
            Stmt::FirstSuccess { attempts, reset } => {
                for (i, attempt) in attempts.iter().enumerate() {
                    if i > 0 {
                        let text = self.render_expr(reset);
                        self.emit_line(&format!("{text};"));
                        self.blank_line();
                    }
                    self.emit_block(attempt);
                }
            }
            Stmt::Using(ns) => self.emit_line(&format!("using namespace {ns};")),
            Stmt::Comment(text) => self.emit_line(&format!("// {text}")),
            Stmt::Blank => self.blank_line(),
        }
    }

    fn emit_block(&mut self, body: &[Stmt]) {
        self.emit_line("{");
        self.indent();
        self.emit_stmts(body);
        self.dedent();
        self.emit_line("}");
    }

    pub fn render_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Raw(text) | Expr::Ident(text) => text.clone(),
            Expr::Str(text) => format!("\"{}\"", escape_c_string(text)),
            Expr::Call(callee, args) => {
                let args: Vec<String> = args.iter().map(|a| self.render_expr(a)).collect();
                format!("{callee}({})", args.join(", "))
            }
            Expr::AddrOf(inner) => format!("&{}", self.render_expr(inner)),
            Expr::Not(inner) => format!("!{}", self.render_expr(inner)),
            Expr::Assign(target, value) => {
                format!("{} = {}", self.render_expr(target), self.render_expr(value))
            }
            Expr::And(operands) => operands
                .iter()
                .map(|o| self.render_expr(o))
                .collect::<Vec<_>>()
                .join(" && "),
            Expr::AndLines(operands) => {
                let separator = format!(" &&\n{}", INDENT.repeat(self.level + 2));
                operands
                    .iter()
                    .map(|o| self.render_expr(o))
                    .collect::<Vec<_>>()
                    .join(&separator)
            }
            Expr::Cond(cond, then, otherwise) => format!(
                "{} ? {} : {}",
                self.render_expr(cond),
                self.render_expr(then),
                self.render_expr(otherwise)
            ),
            Expr::New { place, init } => match place {
                Some(p) => format!("new ({p}) {}", self.render_expr(init)),
                None => format!("new {}", self.render_expr(init)),
            },
        }
    }
}

pub fn escape_c_string(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render a list of items into source text.
pub fn render_items(items: &[Item]) -> String {
    let mut emitter = CppEmitter::new();
    emitter.emit_items(items);
    emitter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_with_declarations_and_if() {
        let f = Function::new(
            "static int f(int x)",
            vec![
                Stmt::decl("int", "y", Some(Expr::raw("0"))),
                Stmt::if_then(
                    Expr::not(Expr::ident("x")),
                    vec![Stmt::ret(Expr::raw("-1"))],
                ),
                Stmt::ret(Expr::ident("y")),
            ],
        );
        let text = render_items(&[Item::Function(f)]);
        assert_eq!(
            text,
            "static int f(int x)\n{\n    int y = 0;\n    if (!x)\n        return -1;\n    return y;\n}\n\n"
        );
    }

    #[test]
    fn test_first_success_separates_attempts() {
        let stmt = Stmt::FirstSuccess {
            attempts: vec![
                vec![Stmt::expr(Expr::call("a", vec![]))],
                vec![Stmt::expr(Expr::call("b", vec![]))],
                vec![Stmt::expr(Expr::call("c", vec![]))],
            ],
            reset: Expr::call("PyErr_Clear", vec![]),
        };
        let mut emitter = CppEmitter::new();
        emitter.emit_stmt(&stmt);
        let text = emitter.finish();
        assert_eq!(text.matches("PyErr_Clear();").count(), 2);
        let a = text.find("a();").unwrap();
        let b = text.find("b();").unwrap();
        let c = text.find("c();").unwrap();
        assert!(a < b && b < c);
        assert!(text.starts_with("{\n    a();\n}\nPyErr_Clear();\n\n{\n"));
    }

    #[test]
    fn test_and_lines_breaks_operands() {
        let mut emitter = CppEmitter::new();
        emitter.indent();
        let text = emitter.render_expr(&Expr::AndLines(vec![
            Expr::call("parse", vec![]),
            Expr::call("convert", vec![Expr::ident("x")]),
        ]));
        assert_eq!(text, "parse() &&\n            convert(x)");
    }

    #[test]
    fn test_string_literal_and_new_rendering() {
        let emitter = CppEmitter::new();
        assert_eq!(emitter.render_expr(&Expr::str("say \"hi\"\n")), "\"say \\\"hi\\\"\\n\"");
        let placed = Expr::new_in(
            Some("&(self->v)"),
            Expr::call("cv::Point", vec![Expr::ident("x")]),
        );
        assert_eq!(emitter.render_expr(&placed), "new (&(self->v)) cv::Point(x)");
    }

    #[test]
    fn test_initializer_and_struct() {
        let text = render_items(&[
            Item::Struct {
                name: "pyopencv_Foo_t".to_string(),
                fields: vec!["PyObject_HEAD".to_string(), "Ptr<cv::Foo> v;".to_string()],
            },
            Item::Initializer {
                decl: "static PyMethodDef methods[]".to_string(),
                rows: vec!["{NULL, NULL}".to_string()],
            },
        ]);
        assert!(text.contains("struct pyopencv_Foo_t\n{\n    PyObject_HEAD\n    Ptr<cv::Foo> v;\n};\n"));
        assert!(text.contains("static PyMethodDef methods[] =\n{\n    {NULL, NULL}\n};\n"));
    }
}
