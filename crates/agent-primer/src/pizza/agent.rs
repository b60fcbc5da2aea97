use primer_core::{AgentBuilder, LlmAgent};
use primer_model::ModelProvider;
use primer_session::StateMap;

use super::order::OrderState;
use super::tools::{
    AddToppingsTool, CalculateTotalPriceTool, DisplayMenuTool,
    RemoveToppingsTool, SetDeliveryInfoTool, SetPizzaSizeTool,
    SetPizzaTypeTool, SetQuantityTool, ViewCurrentOrderTool,
};

const INSTRUCTION: &str = include_str!("./instruction.md");

/// Builds the pizza ordering assistant with all nine order tools.
pub fn pizza_order_agent<P>(provider: P) -> LlmAgent
where
    P: ModelProvider + 'static,
{
    AgentBuilder::with_model_provider(provider)
        .name("pizza_order_agent")
        .description(
            "A specialized assistant for taking pizza orders with persistent \
             state management",
        )
        .instruction(INSTRUCTION)
        .with_tool(DisplayMenuTool::new())
        .with_tool(SetPizzaTypeTool::new())
        .with_tool(SetPizzaSizeTool::new())
        .with_tool(AddToppingsTool::new())
        .with_tool(RemoveToppingsTool::new())
        .with_tool(SetQuantityTool::new())
        .with_tool(SetDeliveryInfoTool::new())
        .with_tool(CalculateTotalPriceTool::new())
        .with_tool(ViewCurrentOrderTool::new())
        .build()
}

/// The state a new order session starts with.
#[inline]
pub fn default_order_state() -> StateMap {
    OrderState::default().to_state_map()
}
