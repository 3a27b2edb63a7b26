//! Per-class emission: type declarations, converters, property accessors,
//! method tables and type specials.

use crate::errors::DeclbindResult;
use crate::models::{ClassInfo, PropInfo};

use super::builder::{Expr, Function, Item, Stmt};
use super::Generator;

const TYPE_HEAD_INIT: &str = "CV_PYTHON_TYPE_HEAD_INIT()";

impl Generator<'_> {
    /// Declarations placed before every implementation: instance struct,
    /// type object, dealloc and converter, or the forward declaration of a
    /// map converter.
    pub fn gen_type_decl(&self, class: &ClassInfo) -> Vec<Item> {
        if class.ismap {
            return vec![
                Item::Line(format!(
                    "template<> bool pyopencv_to(PyObject* src, {}& dst, const char* name);",
                    class.cname
                )),
                Item::Blank,
            ];
        }
        let mut items = vec![self.instance_struct(class), type_object(class)];
        if class.issimple {
            items.push(Item::Function(Function::new(
                format!("static void pyopencv_{}_dealloc(PyObject* self)", class.name),
                vec![
                    Stmt::expr(Expr::raw(format!(
                        "((pyopencv_{}_t*)self)->v.{}::~{}()",
                        class.name, class.cname, class.sname
                    ))),
                    Stmt::expr(Expr::call("PyObject_Del", vec![Expr::ident("self")])),
                ],
            )));
            items.push(simple_converter(class));
        } else {
            items.push(Item::Function(Function::new(
                format!("static void pyopencv_{}_dealloc(PyObject* self)", class.name),
                vec![
                    Stmt::expr(Expr::raw(format!("((pyopencv_{}_t*)self)->v.release()", class.name))),
                    Stmt::expr(Expr::call("PyObject_Del", vec![Expr::ident("self")])),
                ],
            )));
            items.push(self.ptr_converter(class));
        }
        items
    }

    fn instance_struct(&self, class: &ClassInfo) -> Item {
        let field = if class.issimple {
            format!("{} v;", class.cname)
        } else {
            format!("Ptr<{}> v;", self.storage_cname(class))
        };
        Item::Struct {
            name: format!("pyopencv_{}_t", class.name),
            fields: vec!["PyObject_HEAD".to_string(), field],
        }
    }

    /// Polymorphic classes are held through the root type.
    fn storage_cname(&self, class: &ClassInfo) -> String {
        if class.isalgorithm {
            match self.config.polymorphic_roots.first() {
                Some(root) => format!("{}{root}", self.config.native_root_prefix()),
                None => class.cname.clone(),
            }
        } else {
            class.cname.clone()
        }
    }

    fn ptr_converter(&self, class: &ClassInfo) -> Item {
        let instance = format!("pyopencv_{}_t", class.name);
        let cname = &class.cname;
        let from = Function::new(
            format!("static PyObject* from(const Ptr<{cname}>& r)"),
            vec![
                Stmt::decl(
                    format!("{instance}*"),
                    "m",
                    Some(Expr::call(
                        "PyObject_NEW",
                        vec![
                            Expr::ident(instance.as_str()),
                            Expr::raw(format!("&pyopencv_{}_Type", class.name)),
                        ],
                    )),
                ),
                Stmt::Comment("init Ptr with placement new".to_string()),
                Stmt::expr(Expr::new_in(
                    Some("&(m->v)"),
                    Expr::call(format!("Ptr<{}>", self.storage_cname(class)), vec![]),
                )),
                Stmt::expr(Expr::assign(Expr::raw("m->v"), Expr::ident("r"))),
                Stmt::ret(Expr::raw("(PyObject*)m")),
            ],
        );

        let mut to_body = vec![
            Stmt::if_then(Expr::raw("!src || src == Py_None"), vec![Stmt::ret(Expr::raw("true"))]),
            Stmt::if_then(
                type_check("src", class),
                vec![
                    Stmt::expr(Expr::assign(
                        Expr::ident("dst"),
                        Expr::raw(format!("(({instance}*)src)->v.dynamicCast<{cname}>()")),
                    )),
                    Stmt::ret(Expr::raw("true")),
                ],
            ),
        ];
        for mappable in &class.mappables {
            to_body.push(Stmt::Block(vec![
                Stmt::decl(mappable.as_str(), "_src", None),
                Stmt::if_then(
                    Expr::call(
                        "pyopencv_to",
                        vec![Expr::ident("src"), Expr::ident("_src"), Expr::ident("name")],
                    ),
                    vec![Stmt::ret(Expr::call(
                        "cv_mappable_to",
                        vec![Expr::ident("_src"), Expr::ident("dst")],
                    ))],
                ),
            ]));
        }
        to_body.extend(converter_failure(class));
        let to = Function::new(
            format!("static bool to(PyObject* src, Ptr<{cname}>& dst, const char* name)"),
            to_body,
        );

        Item::Specialization {
            header: vec![
                "template<>".to_string(),
                format!("struct PyOpenCV_Converter< Ptr<{cname}> >"),
            ],
            methods: vec![from, to],
        }
    }

    /// Implementation block of one class, or the mapping converter of a map
    /// class.
    pub fn gen_class(&mut self, class: &ClassInfo) -> DeclbindResult<Vec<Item>> {
        if class.ismap {
            return Ok(vec![Item::Function(self.gen_map_code(class)?)]);
        }
        let name = &class.name;
        let mut items = vec![Item::Function(Function::new(
            format!("static PyObject* pyopencv_{name}_repr(PyObject* self)"),
            vec![
                Stmt::decl("char", "str[1000]", None),
                Stmt::expr(Expr::call(
                    "sprintf",
                    vec![
                        Expr::ident("str"),
                        Expr::str(format!("<{} %p>", class.wname)),
                        Expr::ident("self"),
                    ],
                )),
                Stmt::ret(Expr::call("PyString_FromString", vec![Expr::ident("str")])),
            ],
        ))];

        let mut props: Vec<&PropInfo> = class.props.iter().collect();
        props.sort_by(|a, b| a.name.cmp(&b.name));
        let mut getset_rows = Vec::with_capacity(props.len() + 1);
        for prop in props {
            items.push(Item::Function(getter(class, prop)));
            if prop.readonly {
                getset_rows.push(format!(
                    "{{(char*)\"{0}\", (getter)pyopencv_{name}_get_{0}, NULL, (char*)\"{0}\", NULL}},",
                    prop.name
                ));
            } else {
                items.push(Item::Function(setter(class, prop)));
                getset_rows.push(format!(
                    "{{(char*)\"{0}\", (getter)pyopencv_{name}_get_{0}, (setter)pyopencv_{name}_set_{0}, (char*)\"{0}\", NULL}},",
                    prop.name
                ));
            }
        }
        getset_rows.push("{NULL}  /* Sentinel */".to_string());
        items.push(Item::Initializer {
            decl: format!("static PyGetSetDef pyopencv_{name}_getseters[]"),
            rows: getset_rows,
        });

        let model = self.model;
        let mut constructor = "0".to_string();
        if let Some(id) = class.constructor {
            let ctor = model.func(id);
            items.push(Item::Function(self.gen_function(ctor)?));
            constructor = ctor.wrapper_name();
        }
        let mut method_rows = Vec::with_capacity(class.methods.len() + 1);
        for id in class.methods.values() {
            let method = model.func(*id);
            items.push(Item::Function(self.gen_function(method)?));
            method_rows.push(self.tab_entry(method));
        }
        method_rows.push("{NULL,          NULL}".to_string());
        items.push(Item::Initializer {
            decl: format!("static PyMethodDef pyopencv_{name}_methods[]"),
            rows: method_rows,
        });

        let baseptr = class
            .base
            .as_deref()
            .and_then(|base| model.classes.get(base))
            .map(|base| format!("&pyopencv_{}_Type", base.name))
            .unwrap_or_else(|| "NULL".to_string());
        let specials = [
            ("tp_base", baseptr),
            ("tp_dealloc", format!("pyopencv_{name}_dealloc")),
            ("tp_repr", format!("pyopencv_{name}_repr")),
            ("tp_getset", format!("pyopencv_{name}_getseters")),
            ("tp_init", format!("(initproc){constructor}")),
            ("tp_methods", format!("pyopencv_{name}_methods")),
        ];
        items.push(Item::Function(Function::new(
            format!("static void pyopencv_{name}_specials(void)"),
            specials
                .into_iter()
                .map(|(slot, value)| {
                    Stmt::expr(Expr::assign(
                        Expr::raw(format!("pyopencv_{name}_Type.{slot}")),
                        Expr::raw(value),
                    ))
                })
                .collect(),
        )));
        Ok(items)
    }

    /// `pyopencv_to` filling each property from a Python mapping, then
    /// chaining into the base class converter.
    fn gen_map_code(&self, class: &ClassInfo) -> DeclbindResult<Function> {
        let mut body = vec![
            Stmt::decl("PyObject*", "tmp", None),
            Stmt::decl("bool", "ok", None),
        ];
        for prop in &class.props {
            let key = Expr::raw(format!("(char*)\"{}\"", prop.name));
            body.push(Stmt::if_then(
                Expr::call("PyMapping_HasKeyString", vec![Expr::ident("src"), key.clone()]),
                vec![
                    Stmt::expr(Expr::assign(
                        Expr::ident("tmp"),
                        Expr::call("PyMapping_GetItemString", vec![Expr::ident("src"), key]),
                    )),
                    Stmt::expr(Expr::assign(
                        Expr::ident("ok"),
                        Expr::And(vec![
                            Expr::ident("tmp"),
                            Expr::call(
                                "pyopencv_to",
                                vec![Expr::ident("tmp"), Expr::raw(format!("dst.{}", prop.name))],
                            ),
                        ]),
                    )),
                    Stmt::expr(Expr::call("Py_DECREF", vec![Expr::ident("tmp")])),
                    Stmt::if_then(Expr::not(Expr::ident("ok")), vec![Stmt::ret(Expr::raw("false"))]),
                ],
            ));
        }
        body.push(Stmt::Blank);
        match &class.base {
            Some(base) => {
                let base = self.model.class(base)?;
                body.push(Stmt::ret(Expr::call(
                    "pyopencv_to",
                    vec![
                        Expr::ident("src"),
                        Expr::raw(format!("({}&)dst", base.cname)),
                        Expr::ident("name"),
                    ],
                )));
            }
            None => body.push(Stmt::ret(Expr::raw("true"))),
        }
        Ok(Function::new(
            format!(
                "static bool pyopencv_to(PyObject* src, {}& dst, const char* name)",
                class.cname
            ),
            body,
        ))
    }
}

fn type_object(class: &ClassInfo) -> Item {
    Item::Initializer {
        decl: format!("static PyTypeObject pyopencv_{}_Type", class.name),
        rows: vec![
            TYPE_HEAD_INIT.to_string(),
            format!("MODULESTR\".{}\",", class.wname),
            format!("sizeof(pyopencv_{}_t),", class.name),
        ],
    }
}

fn type_check(var: &str, class: &ClassInfo) -> Expr {
    Expr::call(
        "PyObject_TypeCheck",
        vec![
            Expr::ident(var),
            Expr::raw(format!("&pyopencv_{}_Type", class.name)),
        ],
    )
}

fn converter_failure(class: &ClassInfo) -> Vec<Stmt> {
    vec![
        Stmt::expr(Expr::call(
            "failmsg",
            vec![
                Expr::str(format!("Expected {} for argument '%s'", class.cname)),
                Expr::ident("name"),
            ],
        )),
        Stmt::ret(Expr::raw("false")),
    ]
}

fn simple_converter(class: &ClassInfo) -> Item {
    let instance = format!("pyopencv_{}_t", class.name);
    let cname = &class.cname;
    let from = Function::new(
        format!("static PyObject* from(const {cname}& r)"),
        vec![
            Stmt::decl(
                format!("{instance}*"),
                "m",
                Some(Expr::call(
                    "PyObject_NEW",
                    vec![
                        Expr::ident(instance.as_str()),
                        Expr::raw(format!("&pyopencv_{}_Type", class.name)),
                    ],
                )),
            ),
            Stmt::expr(Expr::new_in(
                Some("&m->v"),
                Expr::call(cname.as_str(), vec![Expr::ident("r")]),
            )),
            Stmt::ret(Expr::raw("(PyObject*)m")),
        ],
    );
    let mut to_body = vec![
        Stmt::if_then(Expr::raw("!src || src == Py_None"), vec![Stmt::ret(Expr::raw("true"))]),
        Stmt::if_then(
            type_check("src", class),
            vec![
                Stmt::expr(Expr::assign(
                    Expr::ident("dst"),
                    Expr::raw(format!("(({instance}*)src)->v")),
                )),
                Stmt::ret(Expr::raw("true")),
            ],
        ),
    ];
    to_body.extend(converter_failure(class));
    let to = Function::new(
        format!("static bool to(PyObject* src, {cname}& dst, const char* name)"),
        to_body,
    );
    Item::Specialization {
        header: vec![
            "template<>".to_string(),
            format!("struct PyOpenCV_Converter< {cname} >"),
        ],
        methods: vec![from, to],
    }
}

/// Failure check after downcasting a polymorphic holder.
fn downcast_self(class: &ClassInfo) -> Stmt {
    Stmt::decl(
        format!("{}*", class.cname),
        "_self_",
        Some(Expr::raw(format!("dynamic_cast<{}*>(p->v.get())", class.cname))),
    )
}

fn downcast_error(class: &ClassInfo) -> Expr {
    Expr::call(
        "failmsgp",
        vec![Expr::str(format!(
            "Incorrect type of object (must be '{}' or its derivative)",
            class.name
        ))],
    )
}

fn getter(class: &ClassInfo, prop: &PropInfo) -> Function {
    let signature = format!(
        "static PyObject* pyopencv_{0}_get_{1}(pyopencv_{0}_t* p, void *closure)",
        class.name, prop.name
    );
    let body = if class.isalgorithm {
        vec![
            downcast_self(class),
            Stmt::if_then(Expr::not(Expr::ident("_self_")), vec![Stmt::ret(downcast_error(class))]),
            Stmt::ret(Expr::call(
                "pyopencv_from",
                vec![Expr::raw(format!("_self_->{}", prop.name))],
            )),
        ]
    } else {
        vec![Stmt::ret(Expr::call(
            "pyopencv_from",
            vec![Expr::raw(format!("p->v{}{}", class.access_op(), prop.name))],
        ))]
    };
    Function::new(signature, body)
}

fn setter(class: &ClassInfo, prop: &PropInfo) -> Function {
    let signature = format!(
        "static int pyopencv_{0}_set_{1}(pyopencv_{0}_t* p, PyObject *value, void *closure)",
        class.name, prop.name
    );
    let mut body = vec![Stmt::if_then(
        Expr::not(Expr::ident("value")),
        vec![
            Stmt::expr(Expr::call(
                "PyErr_SetString",
                vec![
                    Expr::ident("PyExc_TypeError"),
                    Expr::str(format!("Cannot delete the {} attribute", prop.name)),
                ],
            )),
            Stmt::ret(Expr::raw("-1")),
        ],
    )];
    let member = if class.isalgorithm {
        body.push(downcast_self(class));
        body.push(Stmt::if_then(
            Expr::not(Expr::ident("_self_")),
            vec![Stmt::expr(downcast_error(class)), Stmt::ret(Expr::raw("-1"))],
        ));
        format!("_self_->{}", prop.name)
    } else {
        format!("p->v{}{}", class.access_op(), prop.name)
    };
    body.push(Stmt::ret(Expr::cond(
        Expr::call("pyopencv_to", vec![Expr::ident("value"), Expr::raw(member)]),
        Expr::raw("0"),
        Expr::raw("-1"),
    )));
    Function::new(signature, body)
}
