use kleeir::{
    metadata::{MetaId, MetaValue, MetadataNode},
    module::{CallArg, Callee, DebugRecordKind, DeclarationForm, Instruction},
    parser::{parse_container, parse_module},
    types::{IType, Type},
    utils::Error,
};

/// `clang -O0 -g -S -emit-llvm` output for
/// `int f(int x, char *buf) { int y = x + 1; return y; }`.
const TARGET_SOURCE: &str = r#"; ModuleID = 'target.c'
source_filename = "target.c"
target datalayout = "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128"
target triple = "x86_64-unknown-linux-gnu"

; Function Attrs: noinline nounwind optnone uwtable
define dso_local i32 @f(i32 noundef %x, ptr noundef %buf) #0 !dbg !10 {
entry:
  %x.addr = alloca i32, align 4
  %buf.addr = alloca ptr, align 8
  %y = alloca i32, align 4
  store i32 %x, ptr %x.addr, align 4
  call void @llvm.dbg.declare(metadata ptr %x.addr, metadata !17, metadata !DIExpression()), !dbg !18
  store ptr %buf, ptr %buf.addr, align 8
  call void @llvm.dbg.declare(metadata ptr %buf.addr, metadata !19, metadata !DIExpression()), !dbg !20
  call void @llvm.dbg.declare(metadata ptr %y, metadata !21, metadata !DIExpression()), !dbg !22
  %0 = load i32, ptr %x.addr, align 4, !dbg !23
  %add = add nsw i32 %0, 1, !dbg !24
  store i32 %add, ptr %y, align 4, !dbg !22
  %1 = load i32, ptr %y, align 4, !dbg !25
  ret i32 %1, !dbg !26
}

; Function Attrs: nocallback nofree nosync nounwind speculatable willreturn memory(none)
declare void @llvm.dbg.declare(metadata, metadata, metadata) #1

attributes #0 = { noinline nounwind optnone uwtable "frame-pointer"="all" "min-legal-vector-width"="0" "no-trapping-math"="true" "stack-protector-buffer-size"="8" "target-cpu"="x86-64" }
attributes #1 = { nocallback nofree nosync nounwind speculatable willreturn memory(none) }

!llvm.dbg.cu = !{!0}
!llvm.module.flags = !{!2, !3, !4, !5, !6, !7, !8}
!llvm.ident = !{!9}

!0 = distinct !DICompileUnit(language: DW_LANG_C11, file: !1, producer: "clang version 17.0.6", isOptimized: false, runtimeVersion: 0, emissionKind: FullDebug, splitDebugInlining: false, nameTableKind: None)
!1 = !DIFile(filename: "target.c", directory: "/tmp/work", checksumkind: CSK_MD5, checksum: "5d41402abc4b2a76b9719d911017c592")
!2 = !{i32 7, !"Dwarf Version", i32 5}
!3 = !{i32 2, !"Debug Info Version", i32 3}
!4 = !{i32 1, !"wchar_size", i32 4}
!5 = !{i32 8, !"PIC Level", i32 2}
!6 = !{i32 7, !"PIE Level", i32 2}
!7 = !{i32 7, !"uwtable", i32 2}
!8 = !{i32 7, !"frame-pointer", i32 2}
!9 = !{!"clang version 17.0.6"}
!10 = distinct !DISubprogram(name: "f", scope: !1, file: !1, line: 1, type: !11, scopeLine: 1, flags: DIFlagPrototyped, spFlags: DISPFlagDefinition, unit: !0, retainedNodes: !16)
!11 = !DISubroutineType(types: !12)
!12 = !{!13, !13, !14}
!13 = !DIBasicType(name: "int", size: 32, encoding: DW_ATE_signed)
!14 = !DIDerivedType(tag: DW_TAG_pointer_type, baseType: !15, size: 64)
!15 = !DIBasicType(name: "char", size: 8, encoding: DW_ATE_signed_char)
!16 = !{}
!17 = !DILocalVariable(name: "x", arg: 1, scope: !10, file: !1, line: 1, type: !13)
!18 = !DILocation(line: 1, column: 11, scope: !10)
!19 = !DILocalVariable(name: "buf", arg: 2, scope: !10, file: !1, line: 1, type: !14)
!20 = !DILocation(line: 1, column: 20, scope: !10)
!21 = !DILocalVariable(name: "y", scope: !10, file: !1, line: 2, type: !13)
!22 = !DILocation(line: 2, column: 7, scope: !10)
!23 = !DILocation(line: 2, column: 11, scope: !10)
!24 = !DILocation(line: 2, column: 13, scope: !10)
!25 = !DILocation(line: 3, column: 10, scope: !10)
!26 = !DILocation(line: 3, column: 3, scope: !10)
"#;

/// Same shape, printed with debug records instead of intrinsic calls.
const RECORD_SOURCE: &str = r#"; ModuleID = 'record.c'
source_filename = "record.c"

define dso_local void @g(i64 noundef %n) #0 !dbg !5 {
entry:
  %n.addr = alloca i64, align 8
  store i64 %n, ptr %n.addr, align 8
    #dbg_declare(ptr %n.addr, !8, !DIExpression(), !9)
  ret void, !dbg !10
}

!5 = distinct !DISubprogram(name: "g", line: 1, flags: DIFlagPrototyped | DIFlagAllCallsDescribed, spFlags: DISPFlagDefinition)
!8 = !DILocalVariable(name: "n", arg: 1, scope: !5, line: 1)
!9 = !DILocation(line: 1, column: 15, scope: !5)
!10 = !DILocation(line: 2, column: 1, scope: !5)
"#;

#[test]
fn parses_module_header_and_target() {
    let module = parse_module(TARGET_SOURCE).expect("fixture should parse");

    assert_eq!(module.id.as_deref(), Some("target.c"));
    assert_eq!(module.source_filename.as_deref(), Some("target.c"));
    assert_eq!(
        module.target_triple.as_deref(),
        Some("x86_64-unknown-linux-gnu")
    );
    assert!(module.data_layout.is_some());
    assert!(!module.is_materialized());
}

#[test]
fn parses_function_signature() {
    let module = parse_module(TARGET_SOURCE).expect("fixture should parse");
    let function = module.function("f").expect("@f should be defined");

    assert_eq!(function.arity(), 2);
    assert!(!function.variadic);
    assert_eq!(function.return_type, Type::Int(IType::I32));
    assert_eq!(function.param_type(0), Some(&Type::Int(IType::I32)));
    assert_eq!(function.param_type(1), Some(&Type::Ptr { addrspace: 0 }));
    assert_eq!(function.params[0].name.as_deref(), Some("x"));
    assert_eq!(function.params[1].attributes, "noundef");
    assert_eq!(function.subprogram, Some(MetaId(10)));

    let intrinsic = module
        .function("llvm.dbg.declare")
        .expect("intrinsic should be declared");
    assert!(intrinsic.is_declaration());
    assert_eq!(intrinsic.arity(), 3);
    assert!(intrinsic.params.iter().all(|p| p.ty == Type::Metadata));
}

#[test]
fn keeps_entry_block_in_program_order() {
    let module = parse_module(TARGET_SOURCE).expect("fixture should parse");
    let function = module.function("f").expect("@f should be defined");
    let entry = function.entry_block().expect("@f has a body");

    assert_eq!(function.blocks.len(), 1);
    assert_eq!(entry.label.as_deref(), Some("entry"));
    assert_eq!(entry.instructions.len(), 13);
    assert_eq!(
        entry.instructions[0],
        Instruction::Other {
            dest: Some("x.addr".to_string()),
            opcode: "alloca".to_string()
        }
    );
    assert!(entry.instructions[4].is_call());
    assert_eq!(
        entry.instructions.last(),
        Some(&Instruction::Other {
            dest: None,
            opcode: "ret".to_string()
        })
    );
}

#[test]
fn finds_debug_declarations_and_their_variables() {
    let module = parse_module(TARGET_SOURCE).expect("fixture should parse");
    let entry = module
        .function("f")
        .and_then(|f| f.entry_block())
        .expect("@f has a body");

    let variables: Vec<_> = entry
        .debug_declarations()
        .map(|declaration| {
            assert_eq!(declaration.kind, DebugRecordKind::Declare);
            assert_eq!(declaration.form, DeclarationForm::Intrinsic);
            module
                .local_variable(declaration.variable)
                .expect("variable operand should resolve")
        })
        .collect();

    assert_eq!(variables.len(), 3);
    assert_eq!(
        variables
            .iter()
            .map(|v| (v.name, v.ordinal()))
            .collect::<Vec<_>>(),
        vec![("x", Some(0)), ("buf", Some(1)), ("y", None)]
    );
    assert!(variables.iter().all(|v| v.scope == Some(MetaId(10))));
    assert_eq!(variables[2].line, Some(2));
}

#[test]
fn parses_metadata_table() {
    let module = parse_module(TARGET_SOURCE).expect("fixture should parse");

    assert_eq!(module.metadata.len(), 27);
    assert_eq!(
        module.named_metadata.get("llvm.dbg.cu"),
        Some(&vec![MetaId(0)])
    );

    let unit = module.metadata_node(MetaId(0)).expect("!0 is defined");
    assert!(unit.is_distinct());
    assert_eq!(unit.kind(), Some("DICompileUnit"));
    assert_eq!(
        unit.field("producer").and_then(MetaValue::as_str),
        Some("clang version 17.0.6")
    );
    assert_eq!(
        unit.field("emissionKind"),
        Some(&MetaValue::Word("FullDebug".to_string()))
    );

    let flags = module.metadata_node(MetaId(2)).expect("!2 is defined");
    match flags {
        MetadataNode::Tuple { elements, .. } => {
            assert_eq!(
                elements[0],
                MetaValue::Typed {
                    ty: Type::Int(IType::I32),
                    value: "7".to_string()
                }
            );
            assert_eq!(elements[1], MetaValue::Str("Dwarf Version".to_string()));
        }
        other => panic!("expected a tuple, got {other:?}"),
    }

    assert_eq!(
        module.metadata_node(MetaId(16)),
        Some(&MetadataNode::Tuple {
            distinct: false,
            elements: vec![]
        })
    );
}

#[test]
fn materializes_well_formed_module() {
    let mut module = parse_module(TARGET_SOURCE).expect("fixture should parse");
    module.materialize().expect("all references resolve");
    assert!(module.is_materialized());
}

#[test]
fn parses_debug_records() {
    let mut module = parse_module(RECORD_SOURCE).expect("record fixture should parse");
    module.materialize().expect("all references resolve");

    let function = module.function("g").expect("@g should be defined");
    let entry = function.entry_block().expect("@g has a body");
    assert!(entry.instructions[2].is_debug_record());

    let declarations: Vec<_> = entry.debug_declarations().collect();
    assert_eq!(declarations.len(), 1);
    assert_eq!(declarations[0].form, DeclarationForm::Record);
    assert_eq!(
        declarations[0].location,
        &MetaValue::Typed {
            ty: Type::Ptr { addrspace: 0 },
            value: "%n.addr".to_string()
        }
    );

    let variable = module
        .local_variable(declarations[0].variable)
        .expect("!8 is a local variable");
    assert_eq!(variable.name, "n");
    assert_eq!(variable.ordinal(), Some(0));

    let subprogram = module.metadata_node(MetaId(5)).expect("!5 is defined");
    assert_eq!(
        subprogram.field("flags"),
        Some(&MetaValue::Word(
            "DIFlagPrototyped | DIFlagAllCallsDescribed".to_string()
        ))
    );
}

#[test]
fn parses_call_operands() {
    let src = r#"
@.str = private unnamed_addr constant [4 x i8] c"%d\0A\00", align 1

define i32 @main() {
  %0 = load i32, ptr @counter, align 4
  %call = call i32 (ptr, ...) @printf(ptr noundef @.str, i32 noundef %0)
  %r = tail call fastcc noundef i32 %fptr(ptr nonnull align 8 dereferenceable(16) %p)
  ret i32 0
}

declare i32 @printf(ptr noundef, ...)
"#;
    let module = parse_module(src).expect("source should parse");
    let main = module.function("main").expect("@main should be defined");
    let entry = main.entry_block().expect("@main has a body");
    assert_eq!(entry.label, None);

    let Instruction::Call(printf) = &entry.instructions[1] else {
        panic!("expected a call, got {:?}", entry.instructions[1]);
    };
    assert_eq!(printf.dest.as_deref(), Some("call"));
    assert_eq!(printf.callee, Callee::Direct("printf".to_string()));
    assert_eq!(
        printf.ret,
        Type::Function {
            ret: Box::new(Type::Int(IType::I32)),
            params: vec![Type::Ptr { addrspace: 0 }],
            variadic: true,
        }
    );
    assert_eq!(printf.args.len(), 2);
    assert_eq!(
        printf.args[1],
        CallArg::Value {
            ty: Type::Int(IType::I32),
            attributes: "noundef".to_string(),
            value: "%0".to_string(),
        }
    );

    let Instruction::Call(indirect) = &entry.instructions[2] else {
        panic!("expected a call, got {:?}", entry.instructions[2]);
    };
    assert!(indirect.callee.is_indirect());
    assert_eq!(
        indirect.args[0],
        CallArg::Value {
            ty: Type::Ptr { addrspace: 0 },
            attributes: "nonnull align 8 dereferenceable(16)".to_string(),
            value: "%p".to_string(),
        }
    );
    assert!(entry.debug_declarations().next().is_none());

    let printf_decl = module.function("printf").expect("@printf is declared");
    assert!(printf_decl.variadic);
    assert_eq!(printf_decl.arity(), 1);
}

#[test]
fn parses_uncommon_parameter_types() {
    let src = "declare <4 x i32> @v(ptr addrspace(1) %p, [16 x i8] %a, { i32, ptr } %s, <{ i8, i32 }> %q, i8* %legacy, %struct.S %named, double %d, <vscale x 2 x i64> %sv, i1 zeroext %b, ...)\n";
    let module = parse_module(src).expect("source should parse");
    let function = module.function("v").expect("@v is declared");

    let printed: Vec<String> = function.params.iter().map(|p| p.ty.to_string()).collect();
    assert_eq!(
        printed,
        vec![
            "ptr addrspace(1)",
            "[16 x i8]",
            "{ i32, ptr }",
            "<{ i8, i32 }>",
            "i8*",
            "%struct.S",
            "double",
            "<vscale x 2 x i64>",
            "i1",
        ]
    );
    assert_eq!(function.return_type.to_string(), "<4 x i32>");
    assert!(function.variadic);
    assert!(function.params[4].ty.is_pointer_like());
    assert!(function.params[0].ty.is_pointer_like());
    assert_eq!(function.params[8].ty.integer_width(), Some(1));
    assert_eq!(function.params[8].attributes, "zeroext");
    assert_eq!(function.params[8].name.as_deref(), Some("b"));
}

#[test]
fn splits_multi_module_containers() {
    let container = format!("{TARGET_SOURCE}\n{RECORD_SOURCE}");
    let modules = parse_container(&container).expect("container should parse");

    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].id.as_deref(), Some("target.c"));
    assert_eq!(modules[1].id.as_deref(), Some("record.c"));
    assert!(modules[0].function("f").is_some());
    assert!(modules[0].function("g").is_none());
    assert!(modules[1].function("g").is_some());
}

#[test]
fn rejects_empty_container() {
    assert_eq!(
        parse_container("; nothing but a comment\n\n"),
        Err(Error::EmptyContainer)
    );
}

#[test]
fn reports_malformed_define() {
    let src = "define i32 @broken(i32 %x {\n  ret i32 0\n}\n";
    match parse_module(src) {
        Err(Error::ParserErrors { module, errors }) => {
            assert_eq!(module, 0);
            assert!(!errors.is_empty());
            assert!(errors.iter().all(|e| e.span.end <= src.len()));
        }
        other => panic!("expected parser errors, got {other:?}"),
    }
}

#[test]
fn reports_malformed_module_with_container_offsets() {
    let broken = "; ModuleID = 'broken.c'\ndefine void @h(i32 %x {\n}\n";
    let container = format!("{RECORD_SOURCE}{broken}");
    let offset = container.find("; ModuleID = 'broken.c'").unwrap();

    match parse_container(&container) {
        Err(Error::ParserErrors { module, errors }) => {
            assert_eq!(module, 1);
            assert!(!errors.is_empty());
            assert!(errors.iter().all(|e| e.span.start >= offset));
        }
        other => panic!("expected parser errors, got {other:?}"),
    }
}

#[test]
fn materialize_rejects_dangling_references() {
    let src = r#"define void @k(i32 %a) !dbg !1 {
entry:
  call void @llvm.dbg.declare(metadata ptr %a.addr, metadata !2, metadata !DIExpression()), !dbg !3
  ret void
}
!1 = distinct !DISubprogram(name: "k")
!2 = !DILocalVariable(name: "a", arg: 1, scope: !99)
!3 = !DILocation(line: 1, scope: !1)
"#;
    let mut module = parse_module(src).expect("source should parse");
    match module.materialize() {
        Err(Error::UndefinedMetadata { id, .. }) => assert_eq!(id, MetaId(99)),
        other => panic!("expected a dangling reference, got {other:?}"),
    }
    assert!(!module.is_materialized());
}

#[test]
fn materialize_rejects_duplicate_functions() {
    let src = "declare void @dup()\ndeclare void @dup()\n";
    let mut module = parse_module(src).expect("source should parse");
    assert_eq!(
        module.materialize(),
        Err(Error::DuplicateFunction {
            name: "dup".to_string()
        })
    );
}

#[test]
fn rejects_duplicate_metadata_ids() {
    let src = "!1 = !{}\n!1 = !{!1}\n";
    assert_eq!(
        parse_module(src),
        Err(Error::DuplicateMetadata { id: MetaId(1) })
    );
}

#[test]
fn skips_unmodelled_top_level_entities() {
    let src = r#"%struct.S = type { i32, ptr }
@counter = dso_local global i32 0, align 4
@.str = private unnamed_addr constant [3 x i8] c"hi\00", align 1
module asm "nop"
attributes #0 = { noinline nounwind }

define void @f() {
  ret void
}
"#;
    let module = parse_module(src).expect("source should parse");

    assert_eq!(module.functions.len(), 1);
    assert!(module.function("f").is_some());
    assert!(module.metadata.is_empty());
}
