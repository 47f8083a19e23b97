//! Static registry of completion services and assistant agents.
//!
//! The catalog is built once at startup and shared read-only through an
//! `Arc`; nothing in it mutates after construction. Usage counters live in
//! [`crate::domain::usage::UsageMeter`] instead of on [`Service`].

/// One callable completion backend configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Service {
    /// Provider-facing model name (e.g. `gpt-4`).
    pub name: String,
    /// Context window size in tokens. Zero when not applicable.
    pub context_size: u32,
    /// Cost per 1K input tokens in USD.
    pub input_cost: f64,
    /// Cost per 1K output tokens in USD.
    pub output_cost: f64,
    /// Cost per 1K training tokens in USD. Only set for fine-tuning models.
    pub training_cost: f64,
}

impl Service {
    /// Creates a service with a context window and no pricing data.
    pub fn new(name: impl Into<String>, context_size: u32) -> Self {
        Self {
            name: name.into(),
            context_size,
            input_cost: 0.0,
            output_cost: 0.0,
            training_cost: 0.0,
        }
    }

    /// Sets per-1K input and output costs.
    #[must_use]
    pub fn with_costs(mut self, input_cost: f64, output_cost: f64) -> Self {
        self.input_cost = input_cost;
        self.output_cost = output_cost;

        self
    }

    /// Sets the per-1K training cost.
    #[must_use]
    pub fn with_training_cost(mut self, training_cost: f64) -> Self {
        self.training_cost = training_cost;

        self
    }
}

/// Ordered group of related services.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelFamily {
    pub name: String,
    pub services: Vec<Service>,
}

/// Name-based pointer to one service inside one family.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceRef {
    pub family: String,
    pub service: String,
}

impl ServiceRef {
    pub fn new(family: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            service: service.into(),
        }
    }
}

/// Reusable assistant persona bound to one or more services.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    name: String,
    directive: String,
    services: Vec<ServiceRef>,
    preferred_service: Option<ServiceRef>,
}

impl Agent {
    /// Creates an agent. The directive cannot change afterwards.
    pub fn new(
        name: impl Into<String>,
        directive: impl Into<String>,
        services: Vec<ServiceRef>,
    ) -> Self {
        Self {
            name: name.into(),
            directive: directive.into(),
            services,
            preferred_service: None,
        }
    }

    /// Sets the service used for turns ahead of the allowed-list order.
    #[must_use]
    pub fn with_preferred_service(mut self, service: ServiceRef) -> Self {
        self.preferred_service = Some(service);

        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the persona text prefixed to every turn.
    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn services(&self) -> &[ServiceRef] {
        &self.services
    }

    pub fn preferred_service(&self) -> Option<&ServiceRef> {
        self.preferred_service.as_ref()
    }
}

/// UI-facing pairing of an agent name with its activation flag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AgentActivation {
    pub name: String,
    pub active: bool,
}

/// Immutable registry of model families and agents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    families: Vec<ModelFamily>,
    agents: Vec<Agent>,
}

impl Catalog {
    pub fn new(families: Vec<ModelFamily>, agents: Vec<Agent>) -> Self {
        Self { families, agents }
    }

    pub fn families(&self) -> &[ModelFamily] {
        &self.families
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Looks up `service_name` inside `family_name`.
    pub fn service(&self, family_name: &str, service_name: &str) -> Option<&Service> {
        self.families
            .iter()
            .find(|family| family.name == family_name)?
            .services
            .iter()
            .find(|service| service.name == service_name)
    }

    /// Looks up the first service named `service_name` across all families.
    pub fn find_service(&self, service_name: &str) -> Option<&Service> {
        self.families
            .iter()
            .flat_map(|family| family.services.iter())
            .find(|service| service.name == service_name)
    }

    /// Returns `(input_cost, output_cost)` per 1K tokens for one service.
    pub fn service_cost(&self, family_name: &str, service_name: &str) -> Option<(f64, f64)> {
        self.service(family_name, service_name)
            .map(|service| (service.input_cost, service.output_cost))
    }

    pub fn resolve(&self, service_ref: &ServiceRef) -> Option<&Service> {
        self.service(&service_ref.family, &service_ref.service)
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    /// Returns the service a turn with `agent` is sent to.
    ///
    /// The preferred service wins when it resolves; otherwise the first
    /// resolvable allowed service is used.
    pub fn agent_service(&self, agent: &Agent) -> Option<&Service> {
        agent
            .preferred_service()
            .and_then(|service_ref| self.resolve(service_ref))
            .or_else(|| {
                agent
                    .services()
                    .iter()
                    .find_map(|service_ref| self.resolve(service_ref))
            })
    }
}

const GPT4_FAMILY: &str = "gpt-4";
const GPT35_FAMILY: &str = "gpt-3.5";

const BUILDER_DIRECTIVE: &str = "You are a meta application for helping building other applications. You are helping the user with whatever content they have selected. Follow best practices for the content you are helping with. Ask questions when neccessary.";
const CHAT_DIRECTIVE: &str = "You are a helpful chat assistant. You can help with nearly anything, if you are unsure of the validity of an answer state as much.";

/// Builds the catalog shipped with the binary.
pub fn default_catalog() -> Catalog {
    Catalog::new(default_families(), default_agents())
}

fn default_families() -> Vec<ModelFamily> {
    vec![
        ModelFamily {
            name: GPT4_FAMILY.to_string(),
            services: vec![
                Service::new("gpt-4", 8192).with_costs(0.03, 0.06),
                Service::new("gpt-4-0613", 8192).with_costs(0.03, 0.06),
                Service::new("gpt-4-32k", 32768).with_costs(0.06, 0.12),
                Service::new("gpt-4-32k-0613", 32768).with_costs(0.06, 0.12),
                Service::new("gpt-4-0314 (Legacy)", 8192).with_costs(0.03, 0.06),
                Service::new("gpt-4-32k-0314 (Legacy)", 32768).with_costs(0.06, 0.12),
            ],
        },
        ModelFamily {
            name: GPT35_FAMILY.to_string(),
            services: vec![
                Service::new("gpt-3.5-turbo", 4096).with_costs(0.0015, 0.002),
                Service::new("gpt-3.5-turbo-16k", 16384).with_costs(0.003, 0.004),
                Service::new("gpt-3.5-turbo-0613", 4096).with_costs(0.0015, 0.002),
                Service::new("gpt-3.5-turbo-16k-0613", 16384).with_costs(0.003, 0.004),
                Service::new("gpt-3.5-turbo-0301 (Legacy)", 4096).with_costs(0.0015, 0.002),
                Service::new("text-davinci-003 (Legacy)", 4097),
                Service::new("text-davinci-002 (Legacy)", 4097),
                Service::new("code-davinci-002 (Legacy)", 8001),
            ],
        },
        ModelFamily {
            name: "Fine-tuning models".to_string(),
            services: vec![
                Service::new("babbage-002", 0)
                    .with_costs(0.0016, 0.0016)
                    .with_training_cost(0.0004),
                Service::new("davinci-002", 0)
                    .with_costs(0.012, 0.012)
                    .with_training_cost(0.006),
                Service::new("GPT-3.5 Turbo", 0)
                    .with_costs(0.012, 0.016)
                    .with_training_cost(0.008),
            ],
        },
        ModelFamily {
            name: "Embedding models".to_string(),
            services: vec![Service::new("Ada v2", 0).with_costs(0.0001, 0.0)],
        },
    ]
}

fn default_agents() -> Vec<Agent> {
    let gpt4 = ServiceRef::new(GPT4_FAMILY, "gpt-4");
    let gpt35 = ServiceRef::new(GPT35_FAMILY, "gpt-3.5-turbo");

    vec![
        Agent::new("PixelHeat", BUILDER_DIRECTIVE, vec![gpt4.clone()]),
        Agent::new(
            "PixelHeat (Pirate)",
            format!(
                "{BUILDER_DIRECTIVE} You only respond as a helpful pirate, do everything you can \
                 to stay in character. Never break character."
            ),
            vec![gpt4.clone()],
        ),
        Agent::new(
            "Chat Assistant (smart)",
            CHAT_DIRECTIVE,
            vec![gpt4.clone(), gpt35.clone()],
        )
        .with_preferred_service(gpt4.clone()),
        Agent::new("Chat Assistant (eh)", CHAT_DIRECTIVE, vec![gpt35.clone()])
            .with_preferred_service(gpt35),
        Agent::new(
            "Code Reviewer (friendly)",
            "You are a friendly code reviewer. You are not too strict, but you are not too \
             lenient either. You are a good balance of both.",
            vec![gpt4],
        ),
    ]
}
