//! C bodies of the planned conversion and free helpers.

use crate::convert::{ConversionPlan, Count, Direction, FreeKey, RoutineKey, Shape, Step};
use crate::model::{EntityId, Registry, Resolved};

use super::decl::HOST_SUFFIX;

/// `convert_VkFoo_win_to_host` / `convert_VkFoo_array_host_to_win`.
pub fn routine_name(registry: &Registry<Resolved>, key: RoutineKey) -> String {
    let array = match key.shape {
        Shape::Single => "",
        Shape::Array => "_array",
    };
    format!(
        "convert_{}{array}_{}",
        registry.name(key.record),
        key.direction.suffix()
    )
}

/// `free_VkFoo` / `free_VkFoo_array`.
pub fn free_name(registry: &Registry<Resolved>, key: FreeKey) -> String {
    match key.shape {
        Shape::Single => format!("free_{}", registry.name(key.record)),
        Shape::Array => format!("free_{}_array", registry.name(key.record)),
    }
}

/// Every helper of the plan: conversions first, then frees, each nested
/// first so no forward declarations are needed.
pub fn render(registry: &Registry<Resolved>, plan: &ConversionPlan) -> String {
    let mut out = String::new();
    for key in plan.routines() {
        out.push_str(&routine(registry, plan, *key));
    }
    for key in plan.frees() {
        out.push_str(&free(registry, plan, *key));
    }
    out
}

/// Member access paths for one element.
struct Access {
    input: &'static str,
    output: &'static str,
    indent: &'static str,
}

const SINGLE: Access = Access {
    input: "in->",
    output: "out->",
    indent: "    ",
};

const ELEMENT: Access = Access {
    input: "in[i].",
    output: "out[i].",
    indent: "        ",
};

fn step_lines(
    registry: &Registry<Resolved>,
    record: EntityId,
    direction: Direction,
    steps: &[Step],
    access: &Access,
) -> String {
    let Access {
        input,
        output,
        indent,
    } = access;
    let mut body = String::new();
    for step in steps {
        let line = match step {
            Step::Copy { member } => format!("{output}{member} = {input}{member};"),
            Step::CopyFixedArray { member, len } => {
                format!("memcpy({output}{member}, {input}{member}, {len} * sizeof(*{input}{member}));")
            }
            Step::Convert {
                member,
                record: nested,
            } => format!(
                "convert_{}_{}(&{input}{member}, &{output}{member});",
                registry.name(*nested),
                direction.suffix()
            ),
            Step::ConvertArray {
                member,
                record: nested,
                count,
            } => {
                let count = match count {
                    Count::Member(name) => format!("{input}{name}"),
                    Count::One => "1".to_string(),
                };
                format!(
                    "{output}{member} = convert_{}_array_{}({input}{member}, {count});",
                    registry.name(*nested),
                    direction.suffix()
                )
            }
            Step::Unsupported { member, shape } => format!(
                "FIXME(\"Unsupported conversion of {shape} member {}.{member}\\n\");",
                registry.name(record)
            ),
        };
        body.push_str(indent);
        body.push_str(&line);
        body.push('\n');
    }
    body
}

fn routine(registry: &Registry<Resolved>, plan: &ConversionPlan, key: RoutineKey) -> String {
    let name = registry.name(key.record);
    let func = routine_name(registry, key);
    let steps = plan
        .conversion(key.record, key.direction)
        .map(|c| c.steps.as_slice())
        .unwrap_or_default();
    let (src, dst) = match key.direction {
        Direction::WinToHost => (name.to_string(), format!("{name}{HOST_SUFFIX}")),
        Direction::HostToWin => (format!("{name}{HOST_SUFFIX}"), name.to_string()),
    };

    let mut text = String::new();
    match (key.shape, key.direction) {
        (Shape::Single, _) => {
            text.push_str(&format!(
                "static inline void {func}(const {src} *in, {dst} *out)\n{{\n"
            ));
            text.push_str("    if (!in) return;\n\n");
            text.push_str(&step_lines(registry, key.record, key.direction, steps, &SINGLE));
        }
        (Shape::Array, Direction::WinToHost) => {
            text.push_str(&format!(
                "static inline {dst} *{func}(const {src} *in, uint32_t count)\n{{\n"
            ));
            text.push_str(&format!("    {dst} *out;\n"));
            text.push_str("    unsigned int i;\n\n");
            text.push_str("    if (!in) return NULL;\n\n");
            text.push_str("    out = HeapAlloc(GetProcessHeap(), 0, count * sizeof(*out));\n");
            text.push_str("    for (i = 0; i < count; i++)\n    {\n");
            text.push_str(&step_lines(registry, key.record, key.direction, steps, &ELEMENT));
            text.push_str("    }\n\n");
            text.push_str("    return out;\n");
        }
        // Caller-owned output buffer, filled element by element.
        (Shape::Array, Direction::HostToWin) => {
            text.push_str(&format!(
                "static inline void {func}(const {src} *in, {dst} *out, uint32_t count)\n{{\n"
            ));
            text.push_str("    unsigned int i;\n\n");
            text.push_str("    if (!in) return;\n\n");
            text.push_str("    for (i = 0; i < count; i++)\n    {\n");
            text.push_str(&step_lines(registry, key.record, key.direction, steps, &ELEMENT));
            text.push_str("    }\n");
        }
    }
    text.push_str("}\n\n");
    text
}

/// Release calls for the buffers one host element points at.
fn release_lines(
    registry: &Registry<Resolved>,
    plan: &ConversionPlan,
    record: EntityId,
    access: &Access,
) -> String {
    let Access { input, indent, .. } = access;
    let steps = plan
        .conversion(record, Direction::WinToHost)
        .map(|c| c.steps.as_slice())
        .unwrap_or_default();
    let mut body = String::new();
    for step in steps {
        let line = match step {
            Step::ConvertArray {
                member,
                record: nested,
                count,
            } => {
                let count = match count {
                    Count::Member(name) => format!("{input}{name}"),
                    Count::One => "1".to_string(),
                };
                let nested_name = registry.name(*nested);
                format!(
                    "free_{nested_name}_array(({nested_name}{HOST_SUFFIX} *){input}{member}, {count});"
                )
            }
            Step::Convert {
                member,
                record: nested,
            } if plan.owns_heap(*nested) => {
                format!("free_{}(&{input}{member});", registry.name(*nested))
            }
            _ => continue,
        };
        body.push_str(indent);
        body.push_str(&line);
        body.push('\n');
    }
    body
}

fn free(registry: &Registry<Resolved>, plan: &ConversionPlan, key: FreeKey) -> String {
    let name = registry.name(key.record);
    let func = free_name(registry, key);
    let mut text = String::new();
    match key.shape {
        Shape::Single => {
            text.push_str(&format!(
                "static inline void {func}({name}{HOST_SUFFIX} *in)\n{{\n"
            ));
            text.push_str("    if (!in) return;\n\n");
            text.push_str(&release_lines(registry, plan, key.record, &SINGLE));
        }
        Shape::Array => {
            let nested = release_lines(registry, plan, key.record, &ELEMENT);
            text.push_str(&format!(
                "static inline void {func}({name}{HOST_SUFFIX} *in, uint32_t count)\n{{\n"
            ));
            if !nested.is_empty() {
                text.push_str("    unsigned int i;\n\n");
            }
            text.push_str("    if (!in) return;\n\n");
            if !nested.is_empty() {
                text.push_str("    for (i = 0; i < count; i++)\n    {\n");
                text.push_str(&nested);
                text.push_str("    }\n");
            }
            text.push_str("    HeapFree(GetProcessHeap(), 0, in);\n");
        }
    }
    text.push_str("}\n\n");
    text
}
