mod fonts;
mod pipeline;
