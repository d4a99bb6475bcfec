//! Closed-flag-set / arity metadata for the opcodes spec §3 calls out as
//! material to lowering. Anything else is accepted syntactically and
//! passed through opaquely (no `UnknownFlag`/`DuplicatePositional` checks).

/// How many positional arguments an opcode accepts.
#[derive(Debug, Clone, Copy)]
pub(super) enum Arity {
    Fixed(usize),
    Variadic,
}

pub(super) struct OpcodeSpec {
    pub(super) known_flags: &'static [&'static str],
    pub(super) arity: Arity,
}

const RUN: OpcodeSpec = OpcodeSpec {
    known_flags: &["push", "entrypoint", "privileged", "no-cache", "interactive"],
    arity: Arity::Variadic,
};
const COPY: OpcodeSpec = OpcodeSpec {
    known_flags: &["dir", "platform", "from", "chmod", "keep-own"],
    arity: Arity::Variadic,
};
const BUILD: OpcodeSpec = OpcodeSpec {
    known_flags: &["platform", "build-arg", "push"],
    arity: Arity::Variadic,
};
const SAVE_ARTIFACT: OpcodeSpec = OpcodeSpec {
    known_flags: &["keep-ts", "if-exists", "force"],
    arity: Arity::Variadic,
};
const SAVE_IMAGE: OpcodeSpec =
    OpcodeSpec { known_flags: &["push", "cache-hint"], arity: Arity::Variadic };
const ARG: OpcodeSpec = OpcodeSpec { known_flags: &["required"], arity: Arity::Fixed(1) };
const FROM: OpcodeSpec = OpcodeSpec { known_flags: &["platform", "build-arg"], arity: Arity::Variadic };
const FROM_DOCKERFILE: OpcodeSpec =
    OpcodeSpec { known_flags: &["build-arg", "path"], arity: Arity::Variadic };
const LOCALLY: OpcodeSpec = OpcodeSpec { known_flags: &[], arity: Arity::Fixed(0) };
const NO_FLAGS_VARIADIC: OpcodeSpec = OpcodeSpec { known_flags: &[], arity: Arity::Variadic };
const GIT_CLONE: OpcodeSpec = OpcodeSpec { known_flags: &["branch"], arity: Arity::Fixed(2) };

pub(super) fn lookup(full_opcode: &str) -> Option<OpcodeSpec> {
    let spec = match full_opcode {
        "RUN" => RUN,
        "COPY" => COPY,
        "BUILD" => BUILD,
        "SAVE ARTIFACT" => SAVE_ARTIFACT,
        "SAVE IMAGE" => SAVE_IMAGE,
        "ARG" => ARG,
        "FROM" => FROM,
        "FROM DOCKERFILE" => FROM_DOCKERFILE,
        "LOCALLY" => LOCALLY,
        "WORKDIR" | "ENTRYPOINT" | "CMD" | "ENV" | "EXPOSE" | "VOLUME" | "LABEL" => {
            NO_FLAGS_VARIADIC
        }
        "GIT CLONE" => GIT_CLONE,
        _ => return None,
    };
    Some(spec)
}
